//! Versioned group key.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::SenderKeyError;
use crate::{aead::KEY_SIZE, env::Environment};

/// Version assigned to a freshly generated group key
pub const INITIAL_VERSION: u32 = 1;

/// A group's shared symmetric key plus its version.
///
/// Every current member holds the same (key, version) pair. There is no
/// chaining within a version; forward secrecy comes only from rotation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SenderKey {
    key: [u8; KEY_SIZE],
    #[zeroize(skip)]
    version: u32,
}

impl SenderKey {
    /// Create a fresh random key at version 1.
    pub fn generate<E: Environment>(env: &E) -> Result<Self, SenderKeyError> {
        Ok(Self { key: env.random_array()?, version: INITIAL_VERSION })
    }

    /// Create a fresh random key at `old_version + 1`.
    pub fn rotate_from<E: Environment>(old_version: u32, env: &E) -> Result<Self, SenderKeyError> {
        let version = old_version
            .checked_add(1)
            .ok_or(SenderKeyError::VersionOverflow { current: old_version })?;

        Ok(Self { key: env.random_array()?, version })
    }

    /// Successor of this key. The new key shares no material with `self`.
    pub fn rotate<E: Environment>(&self, env: &E) -> Result<Self, SenderKeyError> {
        Self::rotate_from(self.version, env)
    }

    /// Rebuild a key received through the key-exchange channel.
    pub fn from_parts(key: [u8; KEY_SIZE], version: u32) -> Self {
        Self { key, version }
    }

    /// Raw 32-byte key for distribution to members.
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Version number.
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Debug for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderKey")
            .field("key", &"[REDACTED]")
            .field("version", &self.version)
            .finish()
    }
}
