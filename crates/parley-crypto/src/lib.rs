//! Parley Cryptographic Primitives
//!
//! Leaf building blocks for the Parley end-to-end encryption core. Every
//! operation is synchronous and performs no I/O. Randomness and wall-clock
//! time come from an [`Environment`] so tests can run deterministically.
//!
//! # Key Lifecycle
//!
//! ```text
//! Password ──Argon2id──▶ storage key        (slow, human secrets)
//!
//! DH outputs ──HKDF──▶ root key ──HKDF──▶ chain key ──HMAC──▶ message key
//!                                                              │
//!                                                              ▼
//!                                               ChaCha20-Poly1305 (AEAD)
//!
//! SenderKey { key, version } ──────────────────▶ ChaCha20-Poly1305 (AEAD)
//! ```
//!
//! The two KDF families are exposed under distinct names and must not be
//! interchanged: HKDF and the HMAC chain step assume high-entropy input.
//!
//! # Security
//!
//! Authenticity:
//! - `ChaCha20-Poly1305` AEAD with a 256-bit key and 96-bit nonce
//! - Wrong key length, short input and tag mismatch are distinct errors
//! - Failed authentication tag -> reject message, never partial plaintext
//!
//! Key hygiene:
//! - Key-holding types zeroize on drop and redact themselves in `Debug`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod env;
pub mod error;
pub mod kdf;
pub mod sender_keys;

pub use env::{Environment, SystemEnv};
pub use error::CryptoError;
pub use kdf::{PasswordKdfParams, chain_step, derive_key, derive_key_pair, derive_password_key};
pub use sender_keys::{SenderKey, SenderKeyError, SenderKeyMessage, SenderKeyRing};
