//! Sender key ring for a single group or channel.
//!
//! Holds the current key plus a bounded window of previous versions so
//! messages encrypted just before a rotation can still be read. How long old
//! versions stay readable is set by the retention count.

use std::collections::VecDeque;

use super::{
    encryption::{SenderKeyMessage, decrypt_message, encrypt_message},
    error::SenderKeyError,
    key::SenderKey,
};
use crate::env::Environment;

/// Previous versions kept by [`SenderKeyRing::new`]
pub const DEFAULT_RETAINED_VERSIONS: usize = 4;

/// Current and recent sender keys for one group.
///
/// # Invariants
///
/// - `previous` holds strictly older versions than `current`, oldest first
/// - `previous.len() <= retention`
#[derive(Debug, Clone)]
pub struct SenderKeyRing {
    /// Key used for new outgoing messages.
    current: SenderKey,

    /// Older keys, oldest first.
    previous: VecDeque<SenderKey>,

    /// Maximum number of previous versions retained.
    retention: usize,
}

impl SenderKeyRing {
    /// Ring holding `current`, retaining [`DEFAULT_RETAINED_VERSIONS`].
    pub fn new(current: SenderKey) -> Self {
        Self::with_retention(current, DEFAULT_RETAINED_VERSIONS)
    }

    /// Ring holding `current`, retaining up to `retention` older versions.
    pub fn with_retention(current: SenderKey, retention: usize) -> Self {
        Self { current, previous: VecDeque::with_capacity(retention), retention }
    }

    /// Version used for outgoing messages.
    pub fn current_version(&self) -> u32 {
        self.current.version()
    }

    /// Key used for outgoing messages, for distribution to members.
    pub fn current(&self) -> &SenderKey {
        &self.current
    }

    /// Versions that can currently be decrypted, oldest first.
    pub fn versions(&self) -> Vec<u32> {
        self.previous
            .iter()
            .chain(std::iter::once(&self.current))
            .map(SenderKey::version)
            .collect()
    }

    /// Generate the next version and make it current.
    ///
    /// Returns the new key so the caller can distribute it. Membership
    /// removals must be followed by a rotation.
    pub fn rotate<E: Environment>(&mut self, env: &E) -> Result<&SenderKey, SenderKeyError> {
        let next = self.current.rotate(env)?;
        self.install_unchecked(next);

        tracing::debug!(version = self.current.version(), "rotated sender key");
        Ok(&self.current)
    }

    /// Install a key received through the key-exchange channel.
    ///
    /// # Errors
    ///
    /// `StaleVersion` if `key` is not newer than the current key.
    pub fn install(&mut self, key: SenderKey) -> Result<(), SenderKeyError> {
        if key.version() <= self.current.version() {
            return Err(SenderKeyError::StaleVersion {
                current: self.current.version(),
                offered: key.version(),
            });
        }

        tracing::debug!(
            from = self.current.version(),
            to = key.version(),
            "installed distributed sender key"
        );
        self.install_unchecked(key);
        Ok(())
    }

    /// Encrypt under the current version.
    pub fn encrypt<E: Environment>(
        &self,
        plaintext: &[u8],
        env: &E,
    ) -> Result<SenderKeyMessage, SenderKeyError> {
        encrypt_message(&self.current, plaintext, env)
    }

    /// Decrypt with the key matching the message version.
    ///
    /// # Errors
    ///
    /// - `UnknownVersion` if the version was never held or has aged out
    /// - `Crypto(AuthenticationFailed)` on tampering
    pub fn decrypt(&self, message: &SenderKeyMessage) -> Result<Vec<u8>, SenderKeyError> {
        let key = self
            .key_for(message.version)
            .ok_or(SenderKeyError::UnknownVersion { version: message.version })?;

        decrypt_message(key, message)
    }

    fn key_for(&self, version: u32) -> Option<&SenderKey> {
        if self.current.version() == version {
            return Some(&self.current);
        }
        self.previous.iter().find(|key| key.version() == version)
    }

    fn install_unchecked(&mut self, key: SenderKey) {
        let old = std::mem::replace(&mut self.current, key);

        if self.retention == 0 {
            return;
        }
        while self.previous.len() >= self.retention {
            self.previous.pop_front();
        }
        self.previous.push_back(old);
    }
}
