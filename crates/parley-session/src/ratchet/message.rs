//! Ratchet message envelope.

use parley_crypto::aead::NONCE_SIZE;
use serde::{Deserialize, Serialize};

use crate::keys::DH_KEY_SIZE;

/// Encoded size of a [`MessageHeader`]: DH key, `pn` and `counter`
pub const HEADER_SIZE: usize = DH_KEY_SIZE + 4 + 4;

/// Per-message metadata the receiver needs to find the message key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Sender's current ratchet public key
    pub dh: [u8; DH_KEY_SIZE],
    /// Number of messages the sender sent on its previous sending chain
    pub pn: u32,
    /// Position of this message in the sender's current chain
    pub counter: u32,
}

impl MessageHeader {
    /// Fixed-layout encoding bound into the AEAD associated data.
    ///
    /// ```text
    /// dh (32) || pn (u32 BE) || counter (u32 BE)
    /// ```
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..DH_KEY_SIZE].copy_from_slice(&self.dh);
        out[DH_KEY_SIZE..DH_KEY_SIZE + 4].copy_from_slice(&self.pn.to_be_bytes());
        out[DH_KEY_SIZE + 4..].copy_from_slice(&self.counter.to_be_bytes());
        out
    }
}

/// Transport envelope produced by [`crate::DoubleRatchet::encrypt`].
///
/// Immutable once produced. Serialization for the wire is the transport's
/// choice; the type implements serde traits for that purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// Ratchet header
    pub header: MessageHeader,
    /// Ciphertext including the 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
    /// Nonce the ciphertext was sealed under
    pub nonce: [u8; NONCE_SIZE],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian() {
        let header = MessageHeader { dh: [0xAA; DH_KEY_SIZE], pn: 2, counter: 0x0102_0304 };
        let bytes = header.to_bytes();

        assert_eq!(&bytes[..DH_KEY_SIZE], &[0xAA; DH_KEY_SIZE]);
        assert_eq!(&bytes[DH_KEY_SIZE..DH_KEY_SIZE + 4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[DH_KEY_SIZE + 4..], &[1, 2, 3, 4]);
    }

    #[test]
    fn header_fixture() {
        let header = MessageHeader { dh: [0x11; DH_KEY_SIZE], pn: 1, counter: 258 };

        assert_eq!(
            hex::encode(header.to_bytes()),
            format!("{}{}{}", "11".repeat(DH_KEY_SIZE), "00000001", "00000102")
        );
    }

    #[test]
    fn headers_differing_only_in_counter_encode_differently() {
        let a = MessageHeader { dh: [1; DH_KEY_SIZE], pn: 0, counter: 0 };
        let b = MessageHeader { counter: 1, ..a };

        assert_ne!(a.to_bytes(), b.to_bytes());
    }
}
