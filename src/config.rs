use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

pub const DEFAULT_NAME: &str = "lf";
pub const DEFAULT_LOCATION: &str = "default";
pub const DEFAULT_STORE_NAME: &str = "keyvaluepairs";

/// Overrides passed to `initialize`. Missing or empty fields keep the default.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOptions {
    pub name: Option<String>,
    pub location: Option<String>,
    pub store_name: Option<String>,
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = Some(store_name.into());
        self
    }

    /// Resolve the overrides against the defaults and validate the result.
    pub fn resolve(self) -> Result<StoreConfig> {
        let mut config = StoreConfig::default();
        if let Some(name) = non_empty(self.name) {
            config.name = name;
        }
        if let Some(location) = non_empty(self.location) {
            config.location = location;
        }
        if let Some(store_name) = non_empty(self.store_name) {
            config.store_name = store_name;
        }
        config.validate()?;
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Resolved driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Database name, used as the file name by the platform
    pub name: String,
    /// Storage location hint understood by the platform
    pub location: String,
    /// Table holding the key-value records
    pub store_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.store_name) {
            return Err(StorageError::InvalidConfig(format!(
                "store name `{}` is not a valid table identifier",
                self.store_name
            )));
        }
        for (field, value) in [("name", &self.name), ("location", &self.location)] {
            if value.contains(&['/', '\\'][..]) || value.contains("..") {
                return Err(StorageError::InvalidConfig(format!(
                    "{field} `{value}` must not contain path separators"
                )));
            }
        }
        Ok(())
    }
}

// The table name is spliced into SQL text, placeholders can't bind identifiers.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_and_empty_fields() {
        let config = DriverOptions::new()
            .with_name("")
            .resolve()
            .unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.name, "lf");
        assert_eq!(config.location, "default");
        assert_eq!(config.store_name, "keyvaluepairs");
    }

    #[test]
    fn overrides_replace_defaults() {
        let config = DriverOptions::new()
            .with_name("t1")
            .with_store_name("kv")
            .resolve()
            .unwrap();
        assert_eq!(config.name, "t1");
        assert_eq!(config.location, "default");
        assert_eq!(config.store_name, "kv");
    }

    #[test]
    fn rejects_store_names_that_are_not_identifiers() {
        for bad in ["kv; DROP TABLE x", "1kv", "kv-pairs", "k v"] {
            let err = DriverOptions::new().with_store_name(bad).resolve().unwrap_err();
            assert!(matches!(err, StorageError::InvalidConfig(_)), "{bad}");
        }
        assert!(DriverOptions::new().with_store_name("_kv2").resolve().is_ok());
    }

    #[test]
    fn rejects_path_like_names() {
        let err = DriverOptions::new().with_name("../etc").resolve().unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
        let err = DriverOptions::new().with_location("a/b").resolve().unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }

    #[test]
    fn deserializes_camel_case_options() {
        let options: DriverOptions =
            serde_json::from_str(r#"{"name":"t1","storeName":"kv"}"#).unwrap();
        assert_eq!(options.store_name.as_deref(), Some("kv"));
        assert_eq!(options.location, None);
    }
}
