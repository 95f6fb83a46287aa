//! Long-term identity keys.
//!
//! An identity is an Ed25519 signing key. It signs the medium-term prekey and
//! takes part in X3DH through its birationally equivalent X25519 form, so one
//! key pair serves both purposes.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use parley_crypto::Environment;
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use crate::{
    error::SessionError,
    keys::{self, DH_KEY_SIZE},
};

/// Length of an Ed25519 public key
pub const IDENTITY_KEY_SIZE: usize = 32;

/// Length of an Ed25519 signature
pub const SIGNATURE_SIZE: usize = 64;

/// A user's or device's long-term signing key pair.
///
/// Created once at registration and never rotated. The signing key zeroizes
/// itself on drop.
#[derive(Clone)]
pub struct IdentityKeyPair {
    signing: SigningKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity.
    pub fn generate<E: Environment>(env: &E) -> Result<Self, SessionError> {
        let mut seed: [u8; 32] = env.random_array()?;
        let identity = Self::from_seed(&seed);
        seed.zeroize();
        Ok(identity)
    }

    /// Restore an identity from its 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self { signing: SigningKey::from_bytes(seed) }
    }

    /// Secret seed, for the caller's encrypted key storage.
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// Ed25519 public key.
    pub fn public_key(&self) -> [u8; IDENTITY_KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing.sign(message).to_bytes()
    }

    /// Diffie-Hellman with a remote X25519 key using the identity's X25519 form.
    pub(crate) fn agree(&self, remote: &[u8; DH_KEY_SIZE]) -> Result<[u8; DH_KEY_SIZE], SessionError> {
        let secret = StaticSecret::from(self.signing.to_scalar_bytes());
        keys::agree(&secret, remote)
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &keys::hex_prefix(&self.public_key()))
            .field("signing", &"[REDACTED]")
            .finish()
    }
}

/// Parse and validate a remote identity key.
pub(crate) fn verifying_key(bytes: &[u8]) -> Result<VerifyingKey, SessionError> {
    let bytes = <[u8; IDENTITY_KEY_SIZE]>::try_from(bytes)
        .map_err(|_| SessionError::key_length("identity key", IDENTITY_KEY_SIZE, bytes.len()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| SessionError::InvalidIdentityKey)
}

/// X25519 form of a remote identity key.
pub(crate) fn dh_public(identity: &VerifyingKey) -> [u8; DH_KEY_SIZE] {
    identity.to_montgomery().to_bytes()
}

/// Verify `signature` over `message` under `identity`.
///
/// Uses strict verification, which rejects malleable and small-order
/// signatures.
pub(crate) fn verify(
    identity: &VerifyingKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SessionError> {
    let signature = Signature::from_slice(signature).map_err(|_| {
        SessionError::InvalidSignatureLength { expected: SIGNATURE_SIZE, actual: signature.len() }
    })?;
    identity.verify_strict(message, &signature).map_err(|_| SessionError::InvalidSignature)
}
