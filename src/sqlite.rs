use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::platform::{Database, Platform, ReadySignal};

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

/// SQL statement with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Vec<Value>,
}

impl SqlQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Vec::new(),
        }
    }
    pub fn with_param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

pub type Row = HashMap<String, Value>;

/// Rows returned by a statement
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Column of the first row, if any.
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        self.first().and_then(|row| row.get(column))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

/// Quote an identifier so keywords like `order` can name a table.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl TableDefinition {
    /// The record table: surrogate id, unique key, serialized value.
    pub fn key_value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![
                ColumnDefinition::new("id", DataType::Integer)
                    .with_constraint(ColumnConstraint::PrimaryKey),
                ColumnDefinition::new("key", DataType::Text)
                    .with_constraint(ColumnConstraint::Unique),
                ColumnDefinition::new("value", DataType::Text),
            ],
        }
    }

    pub fn create_if_not_exists(&self) -> SqlQuery {
        let columns: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        SqlQuery::new(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.name),
            columns.join(", ")
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }
    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
}

impl DataType {
    fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey,
    Unique,
}

impl ColumnConstraint {
    fn as_sql(self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

/// A rusqlite connection. Statements run one at a time on the blocking pool.
#[derive(Clone)]
pub struct SqliteDatabase {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn execute(&self, query: SqlQuery) -> Result<ResultSet> {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut conn = connection
                .lock()
                .map_err(|_| StorageError::ConnectionPoisoned)?;
            execute_in_transaction(&mut conn, &query)
        })
        .await?
    }
}

fn execute_in_transaction(conn: &mut Connection, query: &SqlQuery) -> Result<ResultSet> {
    let tx = conn.transaction()?;
    let result = {
        let mut stmt = tx.prepare(&query.statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        if columns.is_empty() {
            stmt.execute(params_from_iter(query.params.iter()))?;
            ResultSet::default()
        } else {
            let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                let mut map = HashMap::with_capacity(columns.len());
                for (idx, name) in columns.iter().enumerate() {
                    map.insert(name.clone(), Value::from(row.get_ref(idx)?));
                }
                collected.push(map);
            }
            ResultSet { rows: collected }
        }
    };
    tx.commit()?;
    Ok(result)
}

#[derive(Debug, Clone)]
enum StorageRoot {
    Directory(PathBuf),
    Memory,
}

/// The native SQL capability backed by bundled SQLite.
#[derive(Debug, Clone)]
pub struct SqlitePlatform {
    root: StorageRoot,
    ready: ReadySignal,
}

impl SqlitePlatform {
    /// File databases under `root`. The platform is ready immediately.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: StorageRoot::Directory(root.into()),
            ready: ReadySignal::fired(),
        }
    }

    /// Every opened database is a fresh in-memory one.
    pub fn in_memory() -> Self {
        Self {
            root: StorageRoot::Memory,
            ready: ReadySignal::fired(),
        }
    }

    /// Gate the platform on an external readiness signal.
    pub fn with_ready_signal(mut self, ready: ReadySignal) -> Self {
        self.ready = ready;
        self
    }

    /// Location `default` is the root itself, others are sub-directories.
    pub fn database_path(&self, name: &str, location: &str) -> Option<PathBuf> {
        match &self.root {
            StorageRoot::Memory => None,
            StorageRoot::Directory(root) if location == crate::config::DEFAULT_LOCATION => {
                Some(root.join(name))
            }
            StorageRoot::Directory(root) => Some(root.join(location).join(name)),
        }
    }
}

#[async_trait]
impl Platform for SqlitePlatform {
    async fn ready(&self) -> Result<()> {
        self.ready.wait().await
    }

    async fn open_database(&self, name: &str, location: &str) -> Result<Arc<dyn Database>> {
        let path = self.database_path(name, location);
        debug!(name, location, ?path, "opening sqlite database");
        let connection = tokio::task::spawn_blocking(move || -> Result<Connection> {
            match path {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    Ok(Connection::open(path)?)
                }
                None => Ok(Connection::open_in_memory()?),
            }
        })
        .await??;
        Ok(Arc::new(SqliteDatabase::new(connection)))
    }
}
