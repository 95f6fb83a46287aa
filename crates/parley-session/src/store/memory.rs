use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{SessionId, SessionStore, StoreError, StoredSession};
use crate::ratchet::RatchetState;

/// In-memory session store for testing and simulation
///
/// Keeps each state as its JSON encoding plus a version counter, so every
/// load goes through the same decode path a durable store would. All state is
/// wrapped in `Arc<Mutex<>>`; clones share it.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<HashMap<SessionId, Record>>>,
}

struct Record {
    version: u64,
    encoded: Vec<u8>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// Returns true if no sessions are stored.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, Record>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Backend("mutex poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<StoredSession>, StoreError> {
        let records = self.lock()?;
        let Some(record) = records.get(id) else {
            return Ok(None);
        };

        let state = RatchetState::from_json(&record.encoded)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        Ok(Some(StoredSession { version: record.version, state }))
    }

    fn compare_and_swap(
        &self,
        id: &SessionId,
        expected: Option<u64>,
        state: &RatchetState,
    ) -> Result<u64, StoreError> {
        let encoded = state.to_json().map_err(|e| StoreError::Corrupted(e.to_string()))?;
        let mut records = self.lock()?;

        let actual = records.get(id).map(|record| record.version);
        if actual != expected {
            return Err(StoreError::Conflict { expected, actual });
        }

        let version = actual.map_or(1, |v| v + 1);
        records.insert(id.clone(), Record { version, encoded });
        Ok(version)
    }

    fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(id).is_some())
    }
}
