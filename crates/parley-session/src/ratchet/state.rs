//! Serializable per-peer session record.
//!
//! A [`RatchetState`] is created by the X3DH handshake and then threaded
//! through every [`crate::DoubleRatchet`] call. It carries raw key material:
//! whoever persists it must encrypt the serialized blob at rest.

use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::skipped::SkippedKeys;
use crate::{
    error::SessionError,
    keys::{DH_KEY_SIZE, DhKeyPair, hex_prefix},
};

/// Superseded remote ratchet keys remembered for replay detection
pub(crate) const RETIRED_REMOTE_KEYS: usize = 16;

/// Double Ratchet session state for one (local, remote) pair.
///
/// # Invariants
///
/// - `send_counter` is the number of message keys taken from the current
///   sending chain, `recv_counter` likewise for the receiving chain
/// - `previous_counter` is the length of the sending chain that preceded the
///   current one
/// - `skipped_keys` only holds keys for counters below the point each chain
///   has reached
/// - `retired_remote_keys` never contains `remote_ratchet_key`
///
/// `Debug` prints counters and public keys only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetState {
    pub(crate) root_key: [u8; 32],
    pub(crate) send_chain_key: Option<[u8; 32]>,
    pub(crate) recv_chain_key: Option<[u8; 32]>,
    pub(crate) local_ratchet: DhKeyPair,
    pub(crate) remote_ratchet_key: Option<[u8; DH_KEY_SIZE]>,
    pub(crate) send_counter: u32,
    pub(crate) recv_counter: u32,
    pub(crate) previous_counter: u32,
    pub(crate) skipped_keys: SkippedKeys,
    #[serde(default)]
    pub(crate) retired_remote_keys: VecDeque<[u8; DH_KEY_SIZE]>,
    pub(crate) associated_data: Vec<u8>,
    pub(crate) remote_identity: [u8; 32],
    pub(crate) created_at: u64,
    pub(crate) updated_at: u64,
}

impl RatchetState {
    /// State with a root key and local ratchet pair and no chains yet.
    pub(crate) fn new(
        root_key: [u8; 32],
        local_ratchet: DhKeyPair,
        associated_data: Vec<u8>,
        remote_identity: [u8; 32],
        now: u64,
    ) -> Self {
        Self {
            root_key,
            send_chain_key: None,
            recv_chain_key: None,
            local_ratchet,
            remote_ratchet_key: None,
            send_counter: 0,
            recv_counter: 0,
            previous_counter: 0,
            skipped_keys: SkippedKeys::new(),
            retired_remote_keys: VecDeque::new(),
            associated_data,
            remote_identity,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current root key.
    ///
    /// Changes on every DH ratchet turnover. Exposed so callers can compare
    /// session progress; it never yields a consumed message key.
    pub fn root_key(&self) -> &[u8; 32] {
        &self.root_key
    }

    /// Our current ratchet public key, sent in every header.
    pub fn local_ratchet_key(&self) -> &[u8; DH_KEY_SIZE] {
        self.local_ratchet.public()
    }

    /// Last ratchet public key seen from the peer.
    pub fn remote_ratchet_key(&self) -> Option<&[u8; DH_KEY_SIZE]> {
        self.remote_ratchet_key.as_ref()
    }

    /// Peer's Ed25519 identity key.
    pub fn remote_identity(&self) -> &[u8; 32] {
        &self.remote_identity
    }

    /// Messages sent on the current sending chain.
    pub fn send_counter(&self) -> u32 {
        self.send_counter
    }

    /// Messages received on the current receiving chain.
    pub fn recv_counter(&self) -> u32 {
        self.recv_counter
    }

    /// Length of the previous sending chain.
    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    /// Number of cached skipped message keys.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped_keys.len()
    }

    /// Creation time, seconds since the Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Time of the last successful encrypt or decrypt.
    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// JSON encoding for persistence.
    ///
    /// The output contains plaintext key material.
    pub fn to_json(&self) -> Result<Vec<u8>, SessionError> {
        serde_json::to_vec(self).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    /// Decode a state written by [`Self::to_json`].
    pub fn from_json(bytes: &[u8]) -> Result<Self, SessionError> {
        serde_json::from_slice(bytes).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    /// CBOR encoding for persistence.
    ///
    /// The output contains plaintext key material.
    pub fn to_cbor(&self) -> Result<Vec<u8>, SessionError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a state written by [`Self::to_cbor`].
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, SessionError> {
        ciborium::de::from_reader(bytes).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    /// Remember a superseded remote ratchet key.
    pub(crate) fn retire_remote_key(&mut self, key: [u8; DH_KEY_SIZE]) {
        if self.retired_remote_keys.contains(&key) {
            return;
        }
        while self.retired_remote_keys.len() >= RETIRED_REMOTE_KEYS {
            self.retired_remote_keys.pop_front();
        }
        self.retired_remote_keys.push_back(key);
    }

    pub(crate) fn is_retired_remote_key(&self, key: &[u8; DH_KEY_SIZE]) -> bool {
        self.retired_remote_keys.contains(key)
    }
}

impl Drop for RatchetState {
    fn drop(&mut self) {
        self.root_key.zeroize();
        if let Some(key) = self.send_chain_key.as_mut() {
            key.zeroize();
        }
        if let Some(key) = self.recv_chain_key.as_mut() {
            key.zeroize();
        }
    }
}

impl fmt::Debug for RatchetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatchetState")
            .field("local_ratchet_key", &hex_prefix(self.local_ratchet.public()))
            .field("remote_ratchet_key", &self.remote_ratchet_key.as_ref().map(|k| hex_prefix(k)))
            .field("send_counter", &self.send_counter)
            .field("recv_counter", &self.recv_counter)
            .field("previous_counter", &self.previous_counter)
            .field("has_send_chain", &self.send_chain_key.is_some())
            .field("has_recv_chain", &self.recv_chain_key.is_some())
            .field("skipped_keys", &self.skipped_keys.len())
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RatchetState {
        let mut state = RatchetState::new(
            [1; 32],
            DhKeyPair::from_private([2; 32]),
            vec![3; 64],
            [4; 32],
            1_700_000_000,
        );
        state.send_chain_key = Some([5; 32]);
        state.remote_ratchet_key = Some([6; 32]);
        state.send_counter = 3;
        state.previous_counter = 2;
        state.skipped_keys.insert(([6; 32], 1), [7; 32], 10);
        state
    }

    #[test]
    fn json_roundtrip() {
        let state = state();
        let restored = RatchetState::from_json(&state.to_json().unwrap()).unwrap();

        assert_eq!(restored, state);
    }

    #[test]
    fn cbor_roundtrip() {
        let state = state();
        let restored = RatchetState::from_cbor(&state.to_cbor().unwrap()).unwrap();

        assert_eq!(restored, state);
    }

    #[test]
    fn json_without_retired_keys_still_decodes() {
        let mut value: serde_json::Value = serde_json::from_slice(&state().to_json().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("retired_remote_keys");

        let restored = RatchetState::from_json(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(restored.retired_remote_keys.is_empty());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            RatchetState::from_json(b"{not json"),
            Err(SessionError::Serialization(_))
        ));
        assert!(matches!(RatchetState::from_cbor(&[0xFF, 0x00]), Err(SessionError::Serialization(_))));
    }

    #[test]
    fn debug_hides_keys() {
        let rendered = format!("{:?}", state());

        assert!(rendered.contains("send_counter: 3"));
        assert!(!rendered.contains("root_key"));
    }

    #[test]
    fn retired_keys_are_bounded() {
        let mut state = state();
        for i in 0..(RETIRED_REMOTE_KEYS as u8 + 4) {
            state.retire_remote_key([i; 32]);
        }

        assert_eq!(state.retired_remote_keys.len(), RETIRED_REMOTE_KEYS);
        assert!(!state.is_retired_remote_key(&[0; 32]));
        assert!(state.is_retired_remote_key(&[RETIRED_REMOTE_KEYS as u8 + 3; 32]));
    }
}
