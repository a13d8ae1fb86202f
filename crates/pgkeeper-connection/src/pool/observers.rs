//! Callbacks invoked after the pool recovers from a lost connection

use std::sync::Arc;

use parking_lot::RwLock;
use pgkeeper_core::{KeeperError, Result};

/// A connection-lost callback.
///
/// Concurrent recoveries may each run the full list, so observers must be
/// idempotent.
pub type Observer = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Shared, ordered list of observers.
///
/// Clones share the same list, so an observer registered after a pool was
/// built is still seen by that pool.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Arc<RwLock<Vec<Observer>>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer. Observers run in registration order.
    pub fn register<F>(&self, observer: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Run every observer in order.
    ///
    /// A failing observer is a bug in that observer: the sweep stops there and
    /// the failure is returned.
    pub fn notify(&self) -> Result<()> {
        let snapshot: Vec<Observer> = self.observers.read().clone();
        for (index, observer) in snapshot.iter().enumerate() {
            observer().map_err(|e| {
                tracing::error!(observer = index, error = %e, "connection-lost observer failed");
                KeeperError::Observer(format!("observer #{index}: {e:#}"))
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}
