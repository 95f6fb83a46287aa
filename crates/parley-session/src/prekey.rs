//! Signed and one-time prekeys, and the public bundle peers fetch.
//!
//! The responder keeps the private halves; a directory service (outside this
//! crate) hands the public [`PreKeyBundle`] to initiators. Serving each
//! one-time prekey to at most one initiator is the directory's job.

use parley_crypto::Environment;
use serde::{Deserialize, Serialize};

use crate::{
    error::SessionError,
    identity::{self, IdentityKeyPair},
    keys::{self, DH_KEY_SIZE, DhKeyPair},
};

/// Medium-term DH key signed by the identity key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedPreKey {
    /// Identifier advertised in bundles
    pub id: u32,
    /// The DH key pair
    pub key_pair: DhKeyPair,
    /// Identity signature over the public key
    pub signature: Vec<u8>,
    /// Creation time, seconds since the Unix epoch
    pub created_at: u64,
}

impl SignedPreKey {
    /// Generate and sign a new prekey.
    pub fn generate<E: Environment>(
        identity: &IdentityKeyPair,
        id: u32,
        env: &E,
    ) -> Result<Self, SessionError> {
        let key_pair = DhKeyPair::generate(env)?;
        let signature = identity.sign(key_pair.public()).to_vec();
        Ok(Self { id, key_pair, signature, created_at: env.wall_clock_secs() })
    }
}

/// Single-use DH key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimePreKey {
    /// Identifier advertised in bundles
    pub id: u32,
    /// The DH key pair
    pub key_pair: DhKeyPair,
    /// Creation time, seconds since the Unix epoch
    pub created_at: u64,
}

impl OneTimePreKey {
    /// Generate a batch of `count` keys with consecutive ids from `first_id`.
    pub fn generate_batch<E: Environment>(
        first_id: u32,
        count: u32,
        env: &E,
    ) -> Result<Vec<Self>, SessionError> {
        let created_at = env.wall_clock_secs();
        (0..count)
            .map(|offset| {
                Ok(Self {
                    id: first_id.wrapping_add(offset),
                    key_pair: DhKeyPair::generate(env)?,
                    created_at,
                })
            })
            .collect()
    }
}

/// Public half of a one-time prekey as carried in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimePreKeyPublic {
    /// Identifier of the key
    pub id: u32,
    /// X25519 public key bytes
    pub key: Vec<u8>,
}

/// Public snapshot a peer fetches to start a session with us.
///
/// Fields are raw bytes as received from the directory; lengths and the
/// signature are checked when a handshake consumes the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyBundle {
    /// Ed25519 identity public key
    pub identity_key: Vec<u8>,
    /// Id of the signed prekey
    pub signed_prekey_id: u32,
    /// X25519 signed prekey
    pub signed_prekey: Vec<u8>,
    /// Signature over `signed_prekey` by `identity_key`
    pub signed_prekey_signature: Vec<u8>,
    /// Optional single-use prekey
    pub one_time_prekey: Option<OneTimePreKeyPublic>,
}

impl PreKeyBundle {
    /// Assemble a bundle from our own keys.
    pub fn new(
        identity: &IdentityKeyPair,
        signed_prekey: &SignedPreKey,
        one_time_prekey: Option<&OneTimePreKey>,
    ) -> Self {
        Self {
            identity_key: identity.public_key().to_vec(),
            signed_prekey_id: signed_prekey.id,
            signed_prekey: signed_prekey.key_pair.public().to_vec(),
            signed_prekey_signature: signed_prekey.signature.clone(),
            one_time_prekey: one_time_prekey.map(|otk| OneTimePreKeyPublic {
                id: otk.id,
                key: otk.key_pair.public().to_vec(),
            }),
        }
    }

    /// Check lengths and the signed-prekey signature.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` / `InvalidSignatureLength` for malformed fields
    /// - `InvalidIdentityKey` if the identity key is not an Ed25519 point
    /// - `InvalidSignature` if the signature does not verify
    pub fn verify(&self) -> Result<VerifiedBundle, SessionError> {
        let identity = identity::verifying_key(&self.identity_key)?;
        let signed_prekey = keys::public_key_from_slice("signed prekey", &self.signed_prekey)?;
        let one_time_prekey = self
            .one_time_prekey
            .as_ref()
            .map(|otk| {
                keys::public_key_from_slice("one-time prekey", &otk.key).map(|key| (otk.id, key))
            })
            .transpose()?;

        identity::verify(&identity, &signed_prekey, &self.signed_prekey_signature)?;

        Ok(VerifiedBundle {
            identity_key: identity.to_bytes(),
            identity_dh: identity::dh_public(&identity),
            signed_prekey_id: self.signed_prekey_id,
            signed_prekey,
            one_time_prekey,
        })
    }
}

/// A bundle whose lengths and signature have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedBundle {
    pub(crate) identity_key: [u8; 32],
    pub(crate) identity_dh: [u8; DH_KEY_SIZE],
    pub(crate) signed_prekey_id: u32,
    pub(crate) signed_prekey: [u8; DH_KEY_SIZE],
    pub(crate) one_time_prekey: Option<(u32, [u8; DH_KEY_SIZE])>,
}
