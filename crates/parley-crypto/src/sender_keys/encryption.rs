//! Group message encryption under a [`SenderKey`]
//!
//! Direct AEAD calls with a fresh random nonce per message. The message
//! carries the key version so receivers can pick the matching key.

use serde::{Deserialize, Serialize};

use super::{error::SenderKeyError, key::SenderKey};
use crate::{
    aead::{self, NONCE_SIZE, TAG_SIZE},
    env::Environment,
};

/// A group message encrypted under one sender-key version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderKeyMessage {
    /// Version of the key this message was encrypted under
    pub version: u32,
    /// The 12-byte `ChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext including 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
}

impl SenderKeyMessage {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// Encrypt `plaintext`, returning `(ciphertext, nonce)`.
pub fn encrypt<E: Environment>(
    key: &SenderKey,
    plaintext: &[u8],
    env: &E,
) -> Result<(Vec<u8>, [u8; NONCE_SIZE]), SenderKeyError> {
    let nonce: [u8; NONCE_SIZE] = env.random_array()?;
    let ciphertext = aead::encrypt_with_nonce(plaintext, key.key(), &nonce, &[])?;
    Ok((ciphertext, nonce))
}

/// Decrypt `ciphertext` with `key` and the nonce it was sealed under.
///
/// # Errors
///
/// - `Crypto(AuthenticationFailed)` if the key or version is wrong, or the
///   ciphertext was tampered with
/// - `Crypto(InvalidNonceLength)` if `nonce` is not 12 bytes
pub fn decrypt(
    key: &SenderKey,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, SenderKeyError> {
    Ok(aead::decrypt_with_nonce(ciphertext, key.key(), nonce, &[])?)
}

/// Encrypt into a self-describing [`SenderKeyMessage`].
pub fn encrypt_message<E: Environment>(
    key: &SenderKey,
    plaintext: &[u8],
    env: &E,
) -> Result<SenderKeyMessage, SenderKeyError> {
    let (ciphertext, nonce) = encrypt(key, plaintext, env)?;
    Ok(SenderKeyMessage { version: key.version(), nonce, ciphertext })
}

/// Decrypt a [`SenderKeyMessage`] with `key`.
///
/// The version is not compared here; a mismatched key surfaces as an
/// authentication failure. Use [`super::SenderKeyRing`] to select keys by
/// version.
pub fn decrypt_message(
    key: &SenderKey,
    message: &SenderKeyMessage,
) -> Result<Vec<u8>, SenderKeyError> {
    decrypt(key, &message.ciphertext, &message.nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aead::KEY_SIZE,
        env::{SystemEnv, test_utils::SeededEnv},
        error::CryptoError,
    };

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = SenderKey::generate(&SystemEnv).unwrap();

        let (ciphertext, nonce) = encrypt(&key, b"Hello, channel!", &SystemEnv).unwrap();
        let plaintext = decrypt(&key, &ciphertext, &nonce).unwrap();

        assert_eq!(plaintext, b"Hello, channel!");
    }

    #[test]
    fn encrypt_decrypt_large_message() {
        let key = SenderKey::generate(&SystemEnv).unwrap();
        let plaintext = vec![0x42u8; 64 * 1024];

        let message = encrypt_message(&key, &plaintext, &SystemEnv).unwrap();
        assert_eq!(message.plaintext_len(), plaintext.len());
        assert_eq!(decrypt_message(&key, &message).unwrap(), plaintext);
    }

    #[test]
    fn message_carries_key_version() {
        let key = SenderKey::from_parts([1; KEY_SIZE], 9);
        let message = encrypt_message(&key, b"test", &SystemEnv).unwrap();

        assert_eq!(message.version, 9);
        assert_eq!(message.ciphertext.len(), 4 + TAG_SIZE);
    }

    #[test]
    fn each_message_gets_a_fresh_nonce() {
        let env = SeededEnv::new(3);
        let key = SenderKey::generate(&env).unwrap();

        let first = encrypt_message(&key, b"same", &env).unwrap();
        let second = encrypt_message(&key, b"same", &env).unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn rotated_key_cannot_decrypt_old_version() {
        let old = SenderKey::generate(&SystemEnv).unwrap();
        let new = old.rotate(&SystemEnv).unwrap();

        let message = encrypt_message(&old, b"before rotation", &SystemEnv).unwrap();
        let result = decrypt_message(&new, &message);

        assert_eq!(result, Err(SenderKeyError::Crypto(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let key = SenderKey::generate(&SystemEnv).unwrap();
        let mut message = encrypt_message(&key, b"original", &SystemEnv).unwrap();
        message.ciphertext[0] ^= 0xFF;

        assert!(decrypt_message(&key, &message).is_err());
    }

    #[test]
    fn bad_nonce_length_is_rejected() {
        let key = SenderKey::generate(&SystemEnv).unwrap();
        let (ciphertext, _) = encrypt(&key, b"payload", &SystemEnv).unwrap();

        let result = decrypt(&key, &ciphertext, &[0u8; 24]);
        assert_eq!(
            result,
            Err(SenderKeyError::Crypto(CryptoError::InvalidNonceLength { expected: 12, actual: 24 }))
        );
    }
}
