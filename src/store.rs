use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::Value as Json;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::{DriverOptions, StoreConfig};
use crate::driver::{Driver, Key, Visitor};
use crate::error::{Result, StorageError};
use crate::platform::{Database, Platform};
use crate::serializer::{JsonSerializer, Serializer};
use crate::sqlite::{quote_identifier, SqlQuery, TableDefinition, Value};

pub const DRIVER_NAME: &str = "sqliteDriver";

type Setup = std::result::Result<Arc<dyn Database>, Arc<StorageError>>;

fn table(config: &StoreConfig) -> String {
    quote_identifier(&config.store_name)
}

/// Key-value driver storing one row per key in a SQLite table.
///
/// The connection is opened lazily by the first operation and shared by every
/// later one, whether the open succeeded or not.
///
/// `set` uses `INSERT OR REPLACE`, which deletes the old row and assigns a new
/// surrogate id. `key(index)` looks rows up by `id = index + 1`, so positions
/// shift after overwrites.
pub struct SqliteDriver {
    platform: Arc<dyn Platform>,
    serializer: Arc<dyn Serializer>,
    config: OnceLock<StoreConfig>,
    connection: OnceCell<Setup>,
}

impl SqliteDriver {
    pub fn new(platform: Arc<dyn Platform>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            platform,
            serializer,
            config: OnceLock::new(),
            connection: OnceCell::new(),
        }
    }

    pub fn with_json(platform: Arc<dyn Platform>) -> Self {
        Self::new(platform, Arc::new(JsonSerializer))
    }

    pub fn config(&self) -> Result<&StoreConfig> {
        self.config.get().ok_or(StorageError::NotInitialized)
    }

    /// Wait for the connection and table to be set up.
    pub async fn ready(&self) -> Result<()> {
        self.database().await.map(|_| ())
    }

    async fn database(&self) -> Result<(Arc<dyn Database>, &StoreConfig)> {
        let config = self.config()?;
        match self.connection.get_or_init(|| self.setup(config)).await {
            Ok(db) => Ok((Arc::clone(db), config)),
            Err(err) => Err(StorageError::InitFailed(Arc::clone(err))),
        }
    }

    async fn setup(&self, config: &StoreConfig) -> Setup {
        self.open(config).await.map_err(|err| {
            warn!(name = %config.name, error = %err, "failed to set up storage");
            Arc::new(err)
        })
    }

    async fn open(&self, config: &StoreConfig) -> Result<Arc<dyn Database>> {
        self.platform.ready().await?;
        let db = self
            .platform
            .open_database(&config.name, &config.location)
            .await?;
        db.execute(TableDefinition::key_value(&config.store_name).create_if_not_exists())
            .await?;
        debug!(
            name = %config.name,
            location = %config.location,
            store = %config.store_name,
            "storage ready"
        );
        Ok(db)
    }

    fn decode(&self, stored: Option<&Value>) -> Result<Json> {
        match stored {
            Some(Value::Text(text)) => Ok(self.serializer.deserialize(text)?),
            Some(Value::Blob(bytes)) => {
                let text = std::str::from_utf8(bytes).map_err(anyhow::Error::from)?;
                Ok(self.serializer.deserialize(text)?)
            }
            // A NULL column reads back as null.
            _ => Ok(Json::Null),
        }
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn initialize(&self, options: DriverOptions) -> Result<()> {
        if let Some(current) = self.config.get() {
            warn!(
                store = %current.store_name,
                "driver already initialized, ignoring new options"
            );
            return Ok(());
        }
        let config = options.resolve()?;
        if let Err(ignored) = self.config.set(config) {
            warn!(
                store = %ignored.store_name,
                "driver already initialized, ignoring new options"
            );
        }
        Ok(())
    }

    async fn supports(&self) -> bool {
        if self.config.get().is_none() {
            return false;
        }
        match self.platform.ready().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "sqlite driver not supported");
                false
            }
        }
    }

    async fn get(&self, key: Key) -> Result<Option<Json>> {
        let key = key.normalize();
        let (db, config) = self.database().await?;
        let results = db
            .execute(
                SqlQuery::new(format!(
                    "SELECT * FROM {} WHERE key = ? LIMIT 1",
                    table(config)
                ))
                .with_param(key),
            )
            .await?;
        match results.first() {
            Some(row) => self.decode(row.get("value")).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: Key, value: Json) -> Result<Json> {
        let key = key.normalize();
        let (db, config) = self.database().await?;
        let stored = self.serializer.serialize(&value)?;
        db.execute(
            SqlQuery::new(format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)",
                table(config)
            ))
            .with_param(key)
            .with_param(stored),
        )
        .await?;
        Ok(value)
    }

    async fn remove(&self, key: Key) -> Result<()> {
        let key = key.normalize();
        let (db, config) = self.database().await?;
        db.execute(
            SqlQuery::new(format!("DELETE FROM {} WHERE key = ?", table(config)))
                .with_param(key),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let (db, config) = self.database().await?;
        db.execute(SqlQuery::new(format!("DELETE FROM {}", table(config))))
            .await?;
        Ok(())
    }

    async fn length(&self) -> Result<u64> {
        let (db, config) = self.database().await?;
        let results = db
            .execute(SqlQuery::new(format!(
                "SELECT COUNT(key) AS c FROM {}",
                table(config)
            )))
            .await?;
        let count = results
            .first_value("c")
            .and_then(Value::as_integer)
            .ok_or_else(|| StorageError::UnexpectedResult("COUNT returned no integer".into()))?;
        u64::try_from(count)
            .map_err(|_| StorageError::UnexpectedResult(format!("negative COUNT {count}")))
    }

    async fn key(&self, index: u64) -> Result<Option<String>> {
        let (db, config) = self.database().await?;
        let Some(id) = i64::try_from(index).ok().and_then(|i| i.checked_add(1)) else {
            return Ok(None);
        };
        let results = db
            .execute(
                SqlQuery::new(format!(
                    "SELECT key FROM {} WHERE id = ? LIMIT 1",
                    table(config)
                ))
                .with_param(id),
            )
            .await?;
        Ok(results
            .first_value("key")
            .and_then(Value::as_text)
            .map(str::to_string))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let (db, config) = self.database().await?;
        let results = db
            .execute(SqlQuery::new(format!("SELECT key FROM {}", table(config))))
            .await?;
        Ok(results
            .rows
            .iter()
            .filter_map(|row| row.get("key").and_then(Value::as_text))
            .map(str::to_string)
            .collect())
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> Result<Option<Json>> {
        let (db, config) = self.database().await?;
        let results = db
            .execute(SqlQuery::new(format!("SELECT * FROM {}", table(config))))
            .await?;
        let mut iteration = 0;
        for row in &results.rows {
            // Rows written outside the driver can carry a NULL key.
            let Some(key) = row.get("key").and_then(Value::as_text) else {
                debug!(id = ?row.get("id"), "skipping row without a key");
                continue;
            };
            iteration += 1;
            let value = self.decode(row.get("value"))?;
            if let Some(result) = visitor(value, key, iteration) {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}
