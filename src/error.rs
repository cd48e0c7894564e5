use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by the storage driver.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("options not yet initialized")]
    NotInitialized,

    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("storage initialization failed: {0}")]
    InitFailed(#[source] Arc<StorageError>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Serializer(#[from] anyhow::Error),

    #[error("unexpected result from database: {0}")]
    UnexpectedResult(String),

    #[error("database connection lock poisoned")]
    ConnectionPoisoned,

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// True for errors caused by calling the driver before it is usable.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            StorageError::NotInitialized
                | StorageError::PlatformUnavailable(_)
                | StorageError::InitFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
