//! Latest sensor readings reported by the robot

use std::sync::{Arc, PoisonError, RwLock};

use crate::plan::SensorSnapshot;

/// Shared cell holding the most recent [`SensorSnapshot`]
///
/// Writers swap the whole snapshot; readers get an independent copy. The
/// lock is only held for the swap or the clone.
#[derive(Debug, Clone, Default)]
pub struct StateSync {
    inner: Arc<RwLock<SensorSnapshot>>,
}

impl StateSync {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored readings wholesale
    pub fn replace(&self, snapshot: SensorSnapshot) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    /// Copy of the current readings
    #[must_use]
    pub fn snapshot(&self) -> SensorSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
