//! Host platform collaborators: the readiness event and the native SQL handle.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{Result, StorageError};
use crate::sqlite::{ResultSet, SqlQuery};

/// An open database session.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run one statement with positional parameters inside one transaction.
    async fn execute(&self, query: SqlQuery) -> Result<ResultSet>;
}

/// The native SQL capability, gated on a device readiness signal.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Resolves once the platform has bootstrapped and SQL is available.
    async fn ready(&self) -> Result<()>;

    async fn open_database(&self, name: &str, location: &str) -> Result<Arc<dyn Database>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

/// One-shot readiness event. The first `fire` or `fail` wins, later calls are ignored.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    state: Arc<watch::Sender<Readiness>>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::Pending);
        Self {
            state: Arc::new(tx),
        }
    }

    /// A signal that has already fired.
    pub fn fired() -> Self {
        let signal = Self::new();
        signal.fire();
        signal
    }

    pub fn fire(&self) {
        self.settle(Readiness::Ready);
    }

    /// Settle the signal as unavailable, e.g. the SQL capability is missing.
    pub fn fail(&self, reason: impl Into<String>) {
        self.settle(Readiness::Failed(reason.into()));
    }

    fn settle(&self, outcome: Readiness) {
        self.state.send_if_modified(|state| {
            if *state == Readiness::Pending {
                *state = outcome;
                true
            } else {
                false
            }
        });
    }

    pub fn is_settled(&self) -> bool {
        *self.state.borrow() != Readiness::Pending
    }

    /// Suspend until the signal settles. Never returns if it never does.
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        let outcome = rx
            .wait_for(|state| *state != Readiness::Pending)
            .await
            .map_err(|_| StorageError::PlatformUnavailable("readiness signal dropped".into()))?
            .clone();
        match outcome {
            Readiness::Failed(reason) => Err(StorageError::PlatformUnavailable(reason)),
            Readiness::Ready | Readiness::Pending => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn first_settlement_wins() {
        let signal = ReadySignal::new();
        assert!(!signal.is_settled());
        signal.fail("no sqlite");
        signal.fire();
        assert!(signal.is_settled());
        let err = signal.wait().await.unwrap_err();
        assert!(matches!(err, StorageError::PlatformUnavailable(reason) if reason == "no sqlite"));
    }

    #[tokio::test]
    async fn waiters_resume_when_fired() {
        let signal = ReadySignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        signal.fire();
        waiter.await.unwrap().unwrap();
        assert!(ReadySignal::fired().wait().await.is_ok());
    }
}
