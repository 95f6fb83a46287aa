//! Persistence boundary errors

use thiserror::Error;

/// Errors from a [`super::SessionStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Stored version differs from the one the writer loaded
    ///
    /// Another writer persisted this session in between. Reload and retry
    /// the operation against the newer state.
    #[error("session version conflict: expected {expected:?}, found {actual:?}")]
    Conflict {
        /// Version the writer expected (`None` for "absent")
        expected: Option<u64>,
        /// Version actually stored (`None` if absent)
        actual: Option<u64>,
    },

    /// Stored bytes could not be decoded
    #[error("stored session is corrupted: {0}")]
    Corrupted(String),

    /// Backend failure (lock poisoning, I/O, database)
    #[error("session store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Conflict { .. } => false,
            Self::Corrupted(_) | Self::Backend(_) => true,
        }
    }
}
