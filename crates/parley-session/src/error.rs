//! Session error types.
//!
//! Every failure is returned synchronously and leaves the caller's
//! [`crate::RatchetState`] untouched. [`ErrorKind`] groups variants so callers
//! can tell an attack (authentication) from a local bug (protocol state) or a
//! storage hiccup.

use parley_crypto::CryptoError;
use thiserror::Error;

use crate::store::StoreError;

/// Coarse classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input rejected before any state was touched
    Validation,
    /// Signature or AEAD tag mismatch; treat as a potential attack
    Authentication,
    /// Replay, missing chain or exhausted counter
    ProtocolState,
    /// Randomness or another local resource was unavailable
    Resource,
    /// Persistence collaborator failure
    Storage,
}

/// Errors from X3DH, the Double Ratchet and the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A public or private key had the wrong length
    #[error("invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Which key was malformed
        what: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Signed-prekey signature had the wrong length
    #[error("invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidSignatureLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Identity key bytes are not a valid Ed25519 point
    #[error("identity key is not a valid Ed25519 public key")]
    InvalidIdentityKey,

    /// Signed prekey signature does not verify against the identity key
    #[error("signed prekey signature verification failed")]
    InvalidSignature,

    /// A Diffie-Hellman agreement produced an all-zero output
    #[error("public key yields a non-contributory Diffie-Hellman output")]
    InvalidPublicKey,

    /// Handshake refers to a prekey the responder does not hold
    #[error("{what} id mismatch: expected {expected:?}, got {actual:?}")]
    PreKeyMismatch {
        /// Which prekey did not match
        what: &'static str,
        /// Id of the key the responder supplied
        expected: Option<u32>,
        /// Id named by the handshake
        actual: Option<u32>,
    },

    /// Message was already decrypted, or its key has been discarded
    #[error("duplicate message: counter {counter} already processed")]
    DuplicateMessage {
        /// Counter from the rejected header
        counter: u32,
    },

    /// Header asks for more skipped keys than one message may create
    #[error("too many skipped messages: {requested} requested, limit {limit}")]
    TooManySkipped {
        /// Number of keys the header would have us derive
        requested: u32,
        /// Configured per-message limit
        limit: u32,
    },

    /// No receiving chain exists for the header's ratchet key
    #[error("no receiving chain key for this ratchet key")]
    MissingChainKey,

    /// A message counter would wrap around
    #[error("message counter overflow")]
    CounterOverflow,

    /// No session exists for the requested peer
    #[error("no session for peer")]
    NoSession,

    /// Primitive failure (AEAD tag mismatch, entropy, lengths)
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Persistence collaborator failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// State or message could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SessionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKeyLength { .. }
            | Self::InvalidSignatureLength { .. }
            | Self::InvalidIdentityKey
            | Self::InvalidPublicKey
            | Self::PreKeyMismatch { .. }
            | Self::Serialization(_) => ErrorKind::Validation,

            Self::InvalidSignature => ErrorKind::Authentication,

            Self::DuplicateMessage { .. }
            | Self::TooManySkipped { .. }
            | Self::MissingChainKey
            | Self::CounterOverflow
            | Self::NoSession => ErrorKind::ProtocolState,

            Self::Crypto(err) => match err {
                CryptoError::AuthenticationFailed => ErrorKind::Authentication,
                CryptoError::EntropyUnavailable(_) => ErrorKind::Resource,
                CryptoError::InvalidKeyLength { .. }
                | CryptoError::InvalidNonceLength { .. }
                | CryptoError::CiphertextTooShort { .. }
                | CryptoError::InvalidSaltLength { .. }
                | CryptoError::PasswordKdf(_) => ErrorKind::Validation,
            },

            Self::Store(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if retrying the same input can never succeed.
    ///
    /// Store conflicts and entropy failures are transient: reload the state
    /// and try again. Everything else is a property of the input.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Crypto(err) => err.is_fatal(),
            Self::Store(err) => err.is_fatal(),
            _ => true,
        }
    }

    pub(crate) fn key_length(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::InvalidKeyLength { what, expected, actual }
    }
}
