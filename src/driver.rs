//! The driver contract a host key-value library registers and calls.

use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::warn;

use crate::config::DriverOptions;
use crate::error::{Result, StorageError};

/// Called for every stored record with `(value, key, iteration)`.
/// Returning `Some` stops the scan.
pub type Visitor<'a> = dyn FnMut(Json, &str, u64) -> Option<Json> + Send + 'a;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Name the host registers this driver under.
    fn name(&self) -> &str;

    async fn initialize(&self, options: DriverOptions) -> Result<()>;

    /// Whether the platform can back this driver. Never fails.
    async fn supports(&self) -> bool;

    async fn get(&self, key: Key) -> Result<Option<Json>>;

    /// Store `value` under `key` and hand the original value back.
    async fn set(&self, key: Key, value: Json) -> Result<Json>;

    async fn remove(&self, key: Key) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn length(&self) -> Result<u64>;

    /// Key at a 0-based position.
    async fn key(&self, index: u64) -> Result<Option<String>>;

    async fn keys(&self) -> Result<Vec<String>>;

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> Result<Option<Json>>;
}

/// A storage key. Anything that is not a string gets coerced, with a warning when used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    text: String,
    coerced_from: Option<&'static str>,
}

impl Key {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_coerced(&self) -> bool {
        self.coerced_from.is_some()
    }

    pub(crate) fn normalize(self) -> String {
        if let Some(kind) = self.coerced_from {
            warn!(key = %self.text, kind, "{} used as a key, but it is not a string", self.text);
        }
        self.text
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self {
            text: value.to_string(),
            coerced_from: None,
        }
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self {
            text: value,
            coerced_from: None,
        }
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Self::from(value.as_str())
    }
}

macro_rules! coerced_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Self {
                        text: value.to_string(),
                        coerced_from: Some(stringify!($ty)),
                    }
                }
            }
        )*
    };
}

coerced_key!(i32, i64, u32, u64, usize, f64, bool, char);

/// Report the outcome of `operation` to a Node-style callback as well as the caller.
pub fn with_callback<T, F, C>(operation: F, callback: Option<C>) -> impl Future<Output = Result<T>>
where
    F: Future<Output = Result<T>>,
    C: FnOnce(std::result::Result<&T, &StorageError>),
{
    operation.map(move |result| {
        if let Some(callback) = callback {
            callback(result.as_ref());
        }
        result
    })
}

/// Typed access on top of any driver, going through `serde_json`.
#[async_trait]
pub trait DriverExt: Driver {
    async fn get_as<T, K>(&self, key: K) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
        K: Into<Key> + Send,
    {
        match self.get(key.into()).await? {
            Some(value) => Ok(Some(
                serde_json::from_value(value).map_err(anyhow::Error::from)?,
            )),
            None => Ok(None),
        }
    }

    async fn set_as<T, K>(&self, key: K, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
        K: Into<Key> + Send,
    {
        let value = serde_json::to_value(value).map_err(anyhow::Error::from)?;
        self.set(key.into(), value).await?;
        Ok(())
    }
}

impl<D: Driver + ?Sized> DriverExt for D {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_are_not_coerced() {
        let owned = String::from("a");
        assert!(!Key::from("a").is_coerced());
        assert!(!Key::from(&owned).is_coerced());
        assert_eq!(Key::from(owned).normalize(), "a");
    }

    #[test]
    fn other_keys_are_coerced_to_text() {
        assert_eq!(Key::from(42i64).as_str(), "42");
        assert_eq!(Key::from(1.5f64).as_str(), "1.5");
        assert_eq!(Key::from(true).as_str(), "true");
        assert!(Key::from('x').is_coerced());
        assert_eq!(Key::from(7u32).normalize(), "7");
    }

    #[tokio::test]
    async fn callback_sees_success_and_result_is_returned() {
        let mut seen = None;
        let result = with_callback(
            async { Ok::<_, StorageError>(5u64) },
            Some(|outcome: std::result::Result<&u64, &StorageError>| {
                seen = outcome.ok().copied();
            }),
        )
        .await
        .unwrap();
        assert_eq!(result, 5);
        assert_eq!(seen, Some(5));
    }

    #[tokio::test]
    async fn callback_sees_failure() {
        let mut failed = false;
        let result = with_callback(
            async { Err::<u64, _>(StorageError::NotInitialized) },
            Some(|outcome: std::result::Result<&u64, &StorageError>| {
                failed = matches!(outcome, Err(StorageError::NotInitialized));
            }),
        )
        .await;
        assert!(result.is_err());
        assert!(failed);
    }

    #[tokio::test]
    async fn callback_is_optional() {
        let result = with_callback(
            async { Ok::<_, StorageError>("v") },
            None::<fn(std::result::Result<&&str, &StorageError>)>,
        )
        .await
        .unwrap();
        assert_eq!(result, "v");
    }
}
