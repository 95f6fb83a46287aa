//! Authenticated encryption using `ChaCha20-Poly1305`
//!
//! Two families of entry points:
//!
//! - [`encrypt`]/[`decrypt`] draw a fresh random nonce and carry it as a
//!   prefix of the output blob: `nonce (12) || ciphertext || tag (16)`.
//! - [`encrypt_with_nonce`]/[`decrypt_with_nonce`] take the nonce from the
//!   caller, who is responsible for never repeating a (key, nonce) pair.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{env::Environment, error::CryptoError};

/// Symmetric key size (256 bits)
pub const KEY_SIZE: usize = 32;

/// Nonce size (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encrypt under a fresh random nonce, returning `nonce || ciphertext`.
pub fn encrypt<E: Environment>(
    plaintext: &[u8],
    key: &[u8],
    env: &E,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    let nonce: [u8; NONCE_SIZE] = env.random_array()?;

    let ciphertext = seal(&cipher, &nonce, plaintext, &[]);

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Split the nonce prefix off `blob` and authenticate-decrypt the rest.
///
/// # Errors
///
/// - `InvalidKeyLength` if `key` is not 32 bytes
/// - `CiphertextTooShort` if `blob` cannot hold a nonce and a tag
/// - `AuthenticationFailed` on tag mismatch
pub fn decrypt(blob: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;

    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::CiphertextTooShort {
            minimum: NONCE_SIZE + TAG_SIZE,
            actual: blob.len(),
        });
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
    open(&cipher, nonce, ciphertext, &[])
}

/// Encrypt with a caller-supplied nonce and associated data.
///
/// Returns `ciphertext || tag`; the nonce is not included.
pub fn encrypt_with_nonce(
    plaintext: &[u8],
    key: &[u8],
    nonce: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    check_nonce(nonce)?;

    Ok(seal(&cipher, nonce, plaintext, associated_data))
}

/// Authenticate-decrypt with a caller-supplied nonce and associated data.
pub fn decrypt_with_nonce(
    ciphertext: &[u8],
    key: &[u8],
    nonce: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    check_nonce(nonce)?;

    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::CiphertextTooShort { minimum: TAG_SIZE, actual: ciphertext.len() });
    }

    open(&cipher, nonce, ciphertext, associated_data)
}

fn cipher_for(key: &[u8]) -> Result<ChaCha20Poly1305, CryptoError> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: key.len() });
    }

    ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: key.len() })
}

fn check_nonce(nonce: &[u8]) -> Result<(), CryptoError> {
    if nonce.len() == NONCE_SIZE {
        Ok(())
    } else {
        Err(CryptoError::InvalidNonceLength { expected: NONCE_SIZE, actual: nonce.len() })
    }
}

fn seal(cipher: &ChaCha20Poly1305, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let Ok(ciphertext) =
        cipher.encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with a 12-byte nonce");
    };
    ciphertext
}

fn open(
    cipher: &ChaCha20Poly1305,
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{SystemEnv, test_utils::FailingEnv};

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let blob = encrypt(b"Hello, World!", &KEY, &SystemEnv).unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + 13 + TAG_SIZE);

        let plaintext = decrypt(&blob, &KEY).unwrap();
        assert_eq!(plaintext, b"Hello, World!");
    }

    #[test]
    fn encrypt_decrypt_empty_message() {
        let blob = encrypt(b"", &KEY, &SystemEnv).unwrap();
        assert_eq!(decrypt(&blob, &KEY).unwrap(), b"");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let a = encrypt(b"same", &KEY, &SystemEnv).unwrap();
        let b = encrypt(b"same", &KEY, &SystemEnv).unwrap();

        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let result = encrypt(b"x", &[0u8; 16], &SystemEnv);
        assert_eq!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 }));

        let result = decrypt(&[0u8; 64], &[0u8; 31]);
        assert_eq!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 31 }));
    }

    #[test]
    fn short_blob_is_rejected() {
        let result = decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1], &KEY);
        assert_eq!(result, Err(CryptoError::CiphertextTooShort { minimum: 28, actual: 27 }));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = encrypt(b"secret message", &KEY, &SystemEnv).unwrap();
        let result = decrypt(&blob, &[0x43; KEY_SIZE]);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let mut blob = encrypt(b"original message", &KEY, &SystemEnv).unwrap();
        blob[NONCE_SIZE] ^= 0xFF;
        assert_eq!(decrypt(&blob, &KEY), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn explicit_nonce_roundtrip_with_associated_data() {
        let nonce = [7u8; NONCE_SIZE];
        let ciphertext = encrypt_with_nonce(b"payload", &KEY, &nonce, b"header").unwrap();
        assert_eq!(ciphertext.len(), 7 + TAG_SIZE);

        let plaintext = decrypt_with_nonce(&ciphertext, &KEY, &nonce, b"header").unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn associated_data_mismatch_fails_authentication() {
        let nonce = [7u8; NONCE_SIZE];
        let ciphertext = encrypt_with_nonce(b"payload", &KEY, &nonce, b"header").unwrap();

        let result = decrypt_with_nonce(&ciphertext, &KEY, &nonce, b"other");
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn wrong_nonce_length_is_rejected() {
        let result = encrypt_with_nonce(b"payload", &KEY, &[0u8; 24], &[]);
        assert_eq!(result, Err(CryptoError::InvalidNonceLength { expected: 12, actual: 24 }));

        let result = decrypt_with_nonce(&[0u8; 32], &KEY, &[0u8; 8], &[]);
        assert_eq!(result, Err(CryptoError::InvalidNonceLength { expected: 12, actual: 8 }));
    }

    #[test]
    fn entropy_failure_propagates() {
        let result = encrypt(b"payload", &KEY, &FailingEnv);
        assert!(matches!(result, Err(CryptoError::EntropyUnavailable(_))));
    }
}
