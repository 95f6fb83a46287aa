//! Double Ratchet engine.
//!
//! Every call takes the session's [`RatchetState`] explicitly and either
//! fully updates it or leaves it untouched.
//!
//! # Architecture
//!
//! ```text
//!                 ┌─────────── DH ratchet (on new remote key) ──────────┐
//!                 ▼                                                     │
//! root key ──HKDF──▶ receiving chain ──HMAC──▶ message keys ──▶ decrypt │
//!          ──HKDF──▶ sending chain   ──HMAC──▶ message keys ──▶ encrypt │
//!                                                                       │
//! header { dh, pn, counter } ───────────────────────────────────────────┘
//! ```
//!
//! # Ordering
//!
//! - Messages from a chain may arrive in any order. Keys for gaps are cached
//!   in the skipped-key cache, bounded by [`RatchetConfig`].
//! - A message whose key was already used (or evicted) is rejected as
//!   `DuplicateMessage`.
//! - When the peer's ratchet key changes, the remainder of the old receiving
//!   chain (up to the header's `pn`) is cached before the turnover, so
//!   late messages from before the turnover stay readable.
//!
//! # Concurrency
//!
//! The engine holds no session state. Callers must serialize operations on
//! one session; see [`crate::store::transact`].

pub(crate) mod chain;
mod message;
mod skipped;
mod state;

pub use message::{EncryptedMessage, HEADER_SIZE, MessageHeader};
use parley_crypto::{Environment, aead};
pub use skipped::{SkippedKeyId, SkippedKeys};
pub use state::RatchetState;
use zeroize::Zeroize;

use self::chain::{initial_send_chain, next_message_key, root_step};
use crate::{
    error::SessionError,
    keys::{DH_KEY_SIZE, DhKeyPair, hex_prefix},
};

/// Default bound on keys one message may cause us to skip
pub const DEFAULT_MAX_SKIP: u32 = 1000;

/// Default capacity of the skipped-key cache
pub const DEFAULT_MAX_SKIPPED_KEYS: usize = 2000;

/// Ratchet limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatchetConfig {
    /// Maximum number of message keys a single header may make us derive
    /// and cache. Larger gaps fail with `TooManySkipped`.
    pub max_skip: u32,

    /// Capacity of the skipped-key cache. When full, the oldest entries are
    /// evicted and the messages they belonged to become undecryptable.
    pub max_skipped_keys: usize,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self { max_skip: DEFAULT_MAX_SKIP, max_skipped_keys: DEFAULT_MAX_SKIPPED_KEYS }
    }
}

/// Stateless Double Ratchet engine.
///
/// Draws nonces and ratchet keys from `E` and applies the limits in
/// [`RatchetConfig`].
#[derive(Debug, Clone)]
pub struct DoubleRatchet<E: Environment> {
    env: E,
    config: RatchetConfig,
}

impl<E: Environment> DoubleRatchet<E> {
    /// Engine with default limits.
    pub fn new(env: E) -> Self {
        Self::with_config(env, RatchetConfig::default())
    }

    /// Engine with explicit limits.
    pub fn with_config(env: E, config: RatchetConfig) -> Self {
        Self { env, config }
    }

    /// Configured limits.
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }

    /// Environment used for randomness and timestamps.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Encrypt `plaintext` on the sending chain.
    ///
    /// The message key is derived, used once and wiped. On error `state` is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - `CounterOverflow` if the sending chain is exhausted
    /// - `Crypto(EntropyUnavailable)` if no nonce could be drawn
    pub fn encrypt(
        &self,
        state: &mut RatchetState,
        plaintext: &[u8],
    ) -> Result<EncryptedMessage, SessionError> {
        let counter = state.send_counter;
        let next_counter = counter.checked_add(1).ok_or(SessionError::CounterOverflow)?;

        let mut chain_key = if let Some(key) = state.send_chain_key {
            key
        } else {
            tracing::warn!("no sending chain; seeding from root key");
            initial_send_chain(&state.root_key)
        };

        let header = MessageHeader {
            dh: *state.local_ratchet.public(),
            pn: state.previous_counter,
            counter,
        };
        let nonce: [u8; aead::NONCE_SIZE] = self.env.random_array()?;

        let mut message_key = next_message_key(&mut chain_key);
        let sealed = aead::encrypt_with_nonce(
            plaintext,
            &message_key,
            &nonce,
            &associated_data(state, &header),
        );
        message_key.zeroize();
        let ciphertext = sealed?;

        state.send_chain_key = Some(chain_key);
        chain_key.zeroize();
        state.send_counter = next_counter;
        state.updated_at = self.env.wall_clock_secs();

        Ok(EncryptedMessage { header, ciphertext, nonce })
    }

    /// Decrypt `message`, advancing the receiving side of `state`.
    ///
    /// Runs against a copy of `state` and commits only on success, so a
    /// forged or corrupted message can never move the session forward. This
    /// includes a DH turnover triggered by a header whose ciphertext then
    /// fails to authenticate.
    ///
    /// # Errors
    ///
    /// - `DuplicateMessage` if the message was already processed or its key
    ///   is gone
    /// - `TooManySkipped` if the header jumps further than `max_skip`
    /// - `MissingChainKey` if no receiving chain exists for the header's key
    /// - `InvalidPublicKey` if the header's ratchet key is low order
    /// - `Crypto(AuthenticationFailed)` on tampering or a wrong key
    pub fn decrypt(
        &self,
        state: &mut RatchetState,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, SessionError> {
        let mut working = state.clone();
        let plaintext = self.decrypt_in_place(&mut working, message)?;

        working.updated_at = self.env.wall_clock_secs();
        *state = working;
        Ok(plaintext)
    }

    fn decrypt_in_place(
        &self,
        state: &mut RatchetState,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, SessionError> {
        let header = &message.header;

        if let Some(mut key) = state.skipped_keys.take(&(header.dh, header.counter)) {
            let opened = open(state, message, &key);
            key.zeroize();
            return opened;
        }

        if state.remote_ratchet_key != Some(header.dh) {
            if state.is_retired_remote_key(&header.dh) {
                return Err(SessionError::DuplicateMessage { counter: header.counter });
            }
            self.skip_message_keys(state, header.pn)?;
            dh_ratchet_step(state, header.dh, &self.env)?;
        }

        if header.counter < state.recv_counter {
            return Err(SessionError::DuplicateMessage { counter: header.counter });
        }
        if state.recv_chain_key.is_none() {
            return Err(SessionError::MissingChainKey);
        }

        self.skip_message_keys(state, header.counter)?;

        let mut chain_key = state.recv_chain_key.ok_or(SessionError::MissingChainKey)?;
        let mut message_key = next_message_key(&mut chain_key);
        state.recv_chain_key = Some(chain_key);
        chain_key.zeroize();
        state.recv_counter = header.counter.checked_add(1).ok_or(SessionError::CounterOverflow)?;

        let opened = open(state, message, &message_key);
        message_key.zeroize();
        opened
    }

    /// Cache keys for receiving-chain counters below `until`.
    fn skip_message_keys(&self, state: &mut RatchetState, until: u32) -> Result<(), SessionError> {
        if until <= state.recv_counter {
            return Ok(());
        }
        let (Some(mut chain_key), Some(remote)) = (state.recv_chain_key, state.remote_ratchet_key)
        else {
            return Ok(());
        };

        let requested = until - state.recv_counter;
        if requested > self.config.max_skip {
            return Err(SessionError::TooManySkipped { requested, limit: self.config.max_skip });
        }

        let mut evicted = 0;
        while state.recv_counter < until {
            let message_key = next_message_key(&mut chain_key);
            evicted += state.skipped_keys.insert(
                (remote, state.recv_counter),
                message_key,
                self.config.max_skipped_keys,
            );
            state.recv_counter += 1;
        }
        state.recv_chain_key = Some(chain_key);
        chain_key.zeroize();

        if evicted > 0 {
            tracing::warn!(
                evicted,
                capacity = self.config.max_skipped_keys,
                "skipped-key cache full, evicted oldest keys"
            );
        }
        Ok(())
    }
}

/// DH ratchet turnover onto `remote`.
///
/// Derives a receiving chain from the current local key, then a fresh local
/// key pair and a sending chain from it. Counters reset; `previous_counter`
/// records the length of the sending chain being replaced. The X3DH
/// initiator runs this once against the responder's signed prekey.
pub(crate) fn dh_ratchet_step<E: Environment>(
    state: &mut RatchetState,
    remote: [u8; DH_KEY_SIZE],
    env: &E,
) -> Result<(), SessionError> {
    let mut recv_dh = state.local_ratchet.agree(&remote)?;
    let (root_key, recv_chain) = root_step(&state.root_key, &recv_dh);
    recv_dh.zeroize();

    let next_local = DhKeyPair::generate(env)?;
    let mut send_dh = next_local.agree(&remote)?;
    let (root_key, send_chain) = root_step(&root_key, &send_dh);
    send_dh.zeroize();

    if let Some(previous) = state.remote_ratchet_key.replace(remote) {
        state.retire_remote_key(previous);
    }
    state.root_key = root_key;
    state.recv_chain_key = Some(recv_chain);
    state.send_chain_key = Some(send_chain);
    state.local_ratchet = next_local;
    state.previous_counter = state.send_counter;
    state.send_counter = 0;
    state.recv_counter = 0;

    tracing::debug!(
        remote = %hex_prefix(&remote),
        previous_counter = state.previous_counter,
        "DH ratchet turnover"
    );
    Ok(())
}

/// Session associated data followed by the encoded header.
fn associated_data(state: &RatchetState, header: &MessageHeader) -> Vec<u8> {
    let mut aad = Vec::with_capacity(state.associated_data.len() + HEADER_SIZE);
    aad.extend_from_slice(&state.associated_data);
    aad.extend_from_slice(&header.to_bytes());
    aad
}

fn open(
    state: &RatchetState,
    message: &EncryptedMessage,
    message_key: &[u8; 32],
) -> Result<Vec<u8>, SessionError> {
    Ok(aead::decrypt_with_nonce(
        &message.ciphertext,
        message_key,
        &message.nonce,
        &associated_data(state, &message.header),
    )?)
}
