//! Sender Keys: broadcast encryption for groups and channels
//!
//! Every current member shares one symmetric key per version. There is no
//! per-recipient state and no ratcheting: a message is a single AEAD call
//! under the current key. Rotation replaces the key and bumps the version.
//!
//! # Architecture
//!
//! ```text
//! SenderKey { key, version }
//!        │
//!        ▼ Encrypt (random 96-bit nonce)
//! ChaCha20-Poly1305 Ciphertext + version
//! ```
//!
//! Distribution of keys to members, and withholding them from removed
//! members, is the job of the key-exchange layer.

pub mod encryption;
pub mod error;
pub mod key;
pub mod ring;

pub use encryption::{SenderKeyMessage, decrypt, decrypt_message, encrypt, encrypt_message};
pub use error::SenderKeyError;
pub use key::{INITIAL_VERSION, SenderKey};
pub use ring::{DEFAULT_RETAINED_VERSIONS, SenderKeyRing};
