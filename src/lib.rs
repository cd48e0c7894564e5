//! SQLite-backed key-value storage driver for the Runar ecosystem.
//!
//! # Intention
//!
//! - Let a key-value storage layer persist values in an embedded SQLite database.
//! - Translate each key-value operation into one SQL statement against one table.
//!
//! # Architectural Boundaries
//!
//! - Only the driver, its platform collaborators and SQLite glue belong here.
//! - Value encoding is delegated to an injected [`Serializer`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_sqlite_kv::{Driver, DriverOptions, SqliteDriver, SqlitePlatform};
//!
//! # async fn demo() -> rust_sqlite_kv::Result<()> {
//! let driver = SqliteDriver::with_json(Arc::new(SqlitePlatform::new("/var/lib/app")));
//! driver.initialize(DriverOptions::new().with_store_name("kv")).await?;
//! driver.set("a".into(), serde_json::json!({"x": 1})).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod serializer;
pub mod sqlite;
pub mod store;

pub use config::{DriverOptions, StoreConfig};
pub use driver::{with_callback, Driver, DriverExt, Key, Visitor};
pub use error::{Result, StorageError};
pub use platform::{Database, Platform, ReadySignal};
pub use serializer::{JsonSerializer, Serializer};
pub use sqlite::{SqliteDatabase, SqlitePlatform};
pub use store::{SqliteDriver, DRIVER_NAME};
