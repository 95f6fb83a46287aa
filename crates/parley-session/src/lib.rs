//! Parley pairwise sessions
//!
//! X3DH key agreement and the Double Ratchet for 1:1 end-to-end encryption.
//! Group fan-out uses sender keys from [`parley_crypto::sender_keys`] instead.
//!
//! # Flow
//!
//! ```text
//! IdentityKeyPair ─┬─▶ SignedPreKey / OneTimePreKey ─▶ PreKeyBundle (published)
//!                  │
//! initiator:       └─▶ create_session_from_prekey_bundle ─▶ (RatchetState, SessionInit)
//! responder:           accept_session(SessionInit)       ─▶ RatchetState
//!
//! RatchetState ─▶ DoubleRatchet::encrypt / decrypt ─▶ RatchetState' (persist!)
//! ```
//!
//! # Persistence
//!
//! This crate performs no I/O. After every successful encrypt or decrypt the
//! caller must durably persist the updated [`RatchetState`] before treating
//! the send or receive as complete, and must serialize all operations on a
//! given session. The [`store`] module defines that boundary.
//!
//! # Security
//!
//! - Bundle signatures are verified before any Diffie-Hellman is computed
//! - Non-contributory DH outputs are rejected
//! - Headers are authenticated as AEAD associated data together with both
//!   identity keys
//! - Message keys are single use; chain keys advance one way and old values
//!   are overwritten
//! - Failed decryption never advances the session

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod identity;
pub mod keys;
pub mod prekey;
pub mod ratchet;
pub mod store;
pub mod x3dh;

pub use error::{ErrorKind, SessionError};
pub use identity::IdentityKeyPair;
pub use keys::DhKeyPair;
pub use prekey::{OneTimePreKey, OneTimePreKeyPublic, PreKeyBundle, SignedPreKey, VerifiedBundle};
pub use ratchet::{DoubleRatchet, EncryptedMessage, MessageHeader, RatchetConfig, RatchetState};
pub use store::{MemorySessionStore, SessionId, SessionStore, StoreError, StoredSession};
pub use x3dh::{SessionInit, accept_session, create_session_from_prekey_bundle};
