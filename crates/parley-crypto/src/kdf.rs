//! Key derivation.
//!
//! Two unrelated families that must not be interchanged:
//!
//! - Fast protocol KDFs: HKDF-SHA256 ([`derive_key`], [`derive_key_pair`]) and
//!   the HMAC-SHA256 chain step ([`chain_step`]) used by symmetric ratchets.
//!   Inputs are already high-entropy secrets.
//! - Slow password KDF: Argon2id ([`derive_password_key`]). Inputs are
//!   low-entropy human secrets.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Label for deriving a message key from a chain key
const MESSAGE_KEY_LABEL: &[u8] = &[0x01];

/// Label for deriving the next chain key
const CHAIN_KEY_LABEL: &[u8] = &[0x02];

/// Smallest salt accepted by [`derive_password_key`]
pub const MIN_SALT_SIZE: usize = 16;

/// HKDF-SHA256 producing one 32-byte key.
///
/// Deterministic: same inputs always produce the same output.
pub fn derive_key(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = [0u8; 32];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    okm
}

/// HKDF-SHA256 producing two independent 32-byte keys.
///
/// Used for root-key steps, where the first half replaces the root key and
/// the second half seeds a new chain.
pub fn derive_key_pair(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> ([u8; 32], [u8; 32]) {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = Zeroizing::new([0u8; 64]);
    let Ok(()) = hkdf.expand(info, okm.as_mut_slice()) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&okm[..32]);
    second.copy_from_slice(&okm[32..]);
    (first, second)
}

/// One step of a symmetric ratchet.
///
/// Returns `(next_chain_key, message_key)`. The step is one-way: neither
/// output reveals `chain_key`.
pub fn chain_step(chain_key: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    (hmac_label(chain_key, CHAIN_KEY_LABEL), hmac_label(chain_key, MESSAGE_KEY_LABEL))
}

fn hmac_label(key: &[u8; 32], label: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(label);

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordKdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for PasswordKdfParams {
    fn default() -> Self {
        Self { memory_kib: 19 * 1024, iterations: 2, parallelism: 1 }
    }
}

/// Derive a 256-bit key from a password using Argon2id.
///
/// # Errors
///
/// - `InvalidSaltLength` if `salt` is shorter than [`MIN_SALT_SIZE`]
/// - `PasswordKdf` if Argon2 rejects the parameters
pub fn derive_password_key(
    password: &[u8],
    salt: &[u8],
    params: &PasswordKdfParams,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    if salt.len() < MIN_SALT_SIZE {
        return Err(CryptoError::InvalidSaltLength { minimum: MIN_SALT_SIZE, actual: salt.len() });
    }

    let params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32))
        .map_err(|e| CryptoError::PasswordKdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password, salt, key.as_mut_slice())
        .map_err(|e| CryptoError::PasswordKdf(e.to_string()))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests stay fast.
    const TEST_PARAMS: PasswordKdfParams =
        PasswordKdfParams { memory_kib: 64, iterations: 1, parallelism: 1 };

    #[test]
    fn derive_key_is_deterministic() {
        let a = derive_key(b"input key material", Some(b"salt".as_slice()), b"info");
        let b = derive_key(b"input key material", Some(b"salt".as_slice()), b"info");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_key_domain_separation() {
        let a = derive_key(b"input key material", None, b"label-a");
        let b = derive_key(b"input key material", None, b"label-b");
        assert_ne!(a, b, "different labels must produce different keys");
    }

    #[test]
    fn derive_key_matches_rfc5869_case_1() {
        let ikm = [0x0b; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let okm = derive_key(&ikm, Some(salt.as_slice()), &info);
        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf"
        );
    }

    #[test]
    fn derive_key_pair_halves_differ() {
        let (root, chain) = derive_key_pair(b"dh output", Some([9u8; 32].as_slice()), b"ratchet");
        assert_ne!(root, chain);

        let single = derive_key(b"dh output", Some([9u8; 32].as_slice()), b"ratchet");
        assert_eq!(single, root, "first half is the 32-byte expansion prefix");
    }

    #[test]
    fn chain_step_outputs_are_distinct() {
        let chain_key = [3u8; 32];
        let (next, message) = chain_step(&chain_key);

        assert_ne!(next, message);
        assert_ne!(next, chain_key);
        assert_ne!(message, chain_key);
    }

    #[test]
    fn chain_step_sequence_produces_unique_keys() {
        let mut chain_key = [0u8; 32];
        let mut seen = Vec::new();

        for _ in 0..10 {
            let (next, message) = chain_step(&chain_key);
            assert!(!seen.contains(&message), "message keys must be unique");
            seen.push(message);
            chain_key = next;
        }
    }

    #[test]
    fn password_key_is_deterministic_per_salt() {
        let salt = [1u8; 16];
        let a = derive_password_key(b"correct horse", &salt, &TEST_PARAMS).unwrap();
        let b = derive_password_key(b"correct horse", &salt, &TEST_PARAMS).unwrap();
        let c = derive_password_key(b"correct horse", &[2u8; 16], &TEST_PARAMS).unwrap();

        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn password_key_differs_from_hkdf() {
        let salt = [1u8; 16];
        let slow = derive_password_key(b"secret", &salt, &TEST_PARAMS).unwrap();
        let fast = derive_key(b"secret", Some(salt.as_slice()), b"");
        assert_ne!(*slow, fast);
    }

    #[test]
    fn short_salt_is_rejected() {
        let result = derive_password_key(b"pw", &[0u8; 8], &TEST_PARAMS);
        assert!(matches!(result, Err(CryptoError::InvalidSaltLength { minimum: 16, actual: 8 })));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = PasswordKdfParams { memory_kib: 1, iterations: 0, parallelism: 1 };
        let result = derive_password_key(b"pw", &[0u8; 16], &params);
        assert!(matches!(result, Err(CryptoError::PasswordKdf(_))));
    }
}
