//! Error types for the cryptographic primitives.

use thiserror::Error;

/// Errors from AEAD, key derivation and randomness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Symmetric key has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Nonce has the wrong length
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Required nonce length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Input is too short to contain a nonce and an authentication tag
    #[error("ciphertext too short: need at least {minimum} bytes, got {actual}")]
    CiphertextTooShort {
        /// Smallest acceptable input length
        minimum: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Authentication tag did not verify (wrong key, tampering or corruption)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Password KDF salt is too short
    #[error("invalid salt length: need at least {minimum} bytes, got {actual}")]
    InvalidSaltLength {
        /// Smallest acceptable salt length
        minimum: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Password KDF rejected its parameters or inputs
    #[error("password key derivation failed: {0}")]
    PasswordKdf(String),

    /// The randomness source failed
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl CryptoError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Authentication failures point at an attack or corrupted transport and
    /// must not be retried. Entropy failures may clear up on retry.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailed
            | Self::InvalidKeyLength { .. }
            | Self::InvalidNonceLength { .. }
            | Self::CiphertextTooShort { .. }
            | Self::InvalidSaltLength { .. }
            | Self::PasswordKdf(_) => true,

            Self::EntropyUnavailable(_) => false,
        }
    }

    /// Returns true for AEAD tag mismatches.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}
