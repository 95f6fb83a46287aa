//! X25519 key pairs and Diffie-Hellman agreement.

use std::fmt::{self, Write as _};

use parley_crypto::Environment;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SessionError;

/// Length of an X25519 public key, private key and shared secret
pub const DH_KEY_SIZE: usize = 32;

/// An X25519 key pair used for prekeys, ephemeral keys and ratchet keys.
///
/// Stored as raw bytes so the pair can live inside a serialized
/// [`crate::RatchetState`]. The private half is wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct DhKeyPair {
    public: [u8; DH_KEY_SIZE],
    private: [u8; DH_KEY_SIZE],
}

impl DhKeyPair {
    /// Generate a fresh key pair from the environment's randomness.
    pub fn generate<E: Environment>(env: &E) -> Result<Self, SessionError> {
        let mut private: [u8; DH_KEY_SIZE] = env.random_array()?;
        let pair = Self::from_private(private);
        private.zeroize();
        Ok(pair)
    }

    /// Rebuild a key pair from its private half.
    pub fn from_private(private: [u8; DH_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret).to_bytes();
        Self { public, private: secret.to_bytes() }
    }

    /// Public half.
    pub fn public(&self) -> &[u8; DH_KEY_SIZE] {
        &self.public
    }

    /// Agree with `remote`, rejecting non-contributory outputs.
    pub fn agree(&self, remote: &[u8; DH_KEY_SIZE]) -> Result<[u8; DH_KEY_SIZE], SessionError> {
        agree(&StaticSecret::from(self.private), remote)
    }
}

impl fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public", &hex_prefix(&self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// X25519 agreement between a secret and a remote public key.
///
/// Low-order remote points produce an all-zero output, which is rejected as
/// `InvalidPublicKey`.
pub(crate) fn agree(
    secret: &StaticSecret,
    remote: &[u8; DH_KEY_SIZE],
) -> Result<[u8; DH_KEY_SIZE], SessionError> {
    let shared = secret.diffie_hellman(&PublicKey::from(*remote));
    if !shared.was_contributory() {
        return Err(SessionError::InvalidPublicKey);
    }
    Ok(shared.to_bytes())
}

/// Copy `bytes` into a fixed-size public key, naming it in the error.
pub(crate) fn public_key_from_slice(
    what: &'static str,
    bytes: &[u8],
) -> Result<[u8; DH_KEY_SIZE], SessionError> {
    <[u8; DH_KEY_SIZE]>::try_from(bytes)
        .map_err(|_| SessionError::key_length(what, DH_KEY_SIZE, bytes.len()))
}

/// Short printable prefix of a public key for `Debug` output and logs.
pub(crate) fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).fold(String::with_capacity(8), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
