//! Error types for Sender Keys operations

use thiserror::Error;

use crate::error::CryptoError;

/// Errors from sender key operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SenderKeyError {
    /// Message was encrypted under a version this ring does not hold
    ///
    /// Either the key was never distributed to us or it has aged out of the
    /// retention window.
    #[error("unknown sender key version: {version}")]
    UnknownVersion {
        /// Version carried by the message
        version: u32,
    },

    /// A distributed key is not newer than the one already installed
    #[error("stale sender key: installed version {current}, offered {offered}")]
    StaleVersion {
        /// Version currently installed
        current: u32,
        /// Version that was offered
        offered: u32,
    },

    /// Version counter would overflow on rotation
    #[error("sender key version overflow at {current}")]
    VersionOverflow {
        /// Version when overflow was detected
        current: u32,
    },

    /// Underlying AEAD or randomness failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl SenderKeyError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate a protocol violation or tampering.
    /// Version errors may be recoverable once the key-exchange layer
    /// redistributes keys.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::VersionOverflow { .. } => true,
            Self::Crypto(err) => err.is_fatal(),

            Self::UnknownVersion { .. } | Self::StaleVersion { .. } => false,
        }
    }
}
