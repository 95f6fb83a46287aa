//! Persistence boundary for session state.
//!
//! The core never persists anything itself. A [`SessionStore`] keeps one
//! versioned [`RatchetState`] per [`SessionId`] and offers compare-and-swap so
//! concurrent writers are detected instead of silently losing an update
//! (which would desynchronize the chain keys for good).
//!
//! # At-rest encryption
//!
//! Serialized states contain root, chain and skipped message keys in the
//! clear. Implementations must encrypt the stored blob, e.g. under a key from
//! [`parley_crypto::derive_password_key`] or the platform keystore.
//! [`MemorySessionStore`] does not, and is meant for tests and simulation.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemorySessionStore;
use serde::{Deserialize, Serialize};

use crate::{error::SessionError, ratchet::RatchetState};

/// Identifies one session: an ordered (local, remote) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId {
    /// Local user or device
    pub local: String,
    /// Remote peer
    pub remote: String,
}

impl SessionId {
    /// Session between `local` and `remote`.
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self { local: local.into(), remote: remote.into() }
    }
}

/// A state together with the version it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Monotonic version, starting at 1
    pub version: u64,
    /// Session state
    pub state: RatchetState,
}

/// Versioned storage for session states.
///
/// Must be Clone (shared by every caller), Send + Sync, and synchronous.
/// Implementations typically share internal state via Arc, so clones access
/// the same underlying storage.
pub trait SessionStore: Clone + Send + Sync + 'static {
    /// Load the state for `id`. `None` if no session exists.
    fn load(&self, id: &SessionId) -> Result<Option<StoredSession>, StoreError>;

    /// Write `state` if the stored version equals `expected`.
    ///
    /// `expected = None` means "must not exist yet". Returns the new version.
    ///
    /// # Errors
    ///
    /// `Conflict` if the stored version differs from `expected`.
    fn compare_and_swap(
        &self,
        id: &SessionId,
        expected: Option<u64>,
        state: &RatchetState,
    ) -> Result<u64, StoreError>;

    /// Remove the session. Returns true if it existed.
    ///
    /// Deleting a session destroys its skipped message keys; messages still
    /// in flight become undecryptable.
    fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;
}

/// Persist a newly established session.
///
/// # Errors
///
/// `Store(Conflict)` if a session already exists for `id`.
pub fn create<S: SessionStore>(
    store: &S,
    id: &SessionId,
    state: &RatchetState,
) -> Result<u64, SessionError> {
    Ok(store.compare_and_swap(id, None, state)?)
}

/// Load, operate and persist as one logical transaction.
///
/// `operation` runs on the loaded state; its result is returned only after
/// the updated state has been written back. If another writer got there
/// first the update is discarded and `Store(Conflict)` is returned; the
/// caller should retry from a fresh load. If `operation` fails nothing is
/// written.
///
/// # Errors
///
/// - `NoSession` if nothing is stored for `id`
/// - any error from `operation`
/// - `Store(..)` from the backend
pub fn transact<S, T, F>(store: &S, id: &SessionId, operation: F) -> Result<T, SessionError>
where
    S: SessionStore,
    F: FnOnce(&mut RatchetState) -> Result<T, SessionError>,
{
    let Some(StoredSession { version, mut state }) = store.load(id)? else {
        return Err(SessionError::NoSession);
    };

    let output = operation(&mut state)?;
    let written = store.compare_and_swap(id, Some(version), &state)?;

    tracing::trace!(remote = %id.remote, version = written, "persisted session");
    Ok(output)
}
