//! Domain-separated key derivations for the session layer.
//!
//! ```text
//! X3DH:    0xFF*32 || DH1 || DH2 || DH3 [|| DH4] ──HKDF(X3DH_INFO)──▶ SK
//! Root:    HKDF(salt = RK, ikm = DH(local, remote), ROOT_INFO) ──▶ (RK', CK)
//! Chain:   HMAC(CK, 0x02) ──▶ CK'    HMAC(CK, 0x01) ──▶ MK
//! Seed:    HKDF(ikm = RK, SEND_CHAIN_INIT_INFO) ──▶ CKs   (no sending chain yet)
//! ```

use parley_crypto::{chain_step, derive_key, derive_key_pair};
use zeroize::Zeroize;

/// HKDF info for the initial shared secret
pub(crate) const X3DH_INFO: &[u8] = b"parley-x3dh-v1";

/// HKDF info for root-key ratchet steps
pub(crate) const ROOT_INFO: &[u8] = b"parley-ratchet-root-v1";

/// HKDF info for seeding a sending chain before any DH step
pub(crate) const SEND_CHAIN_INIT_INFO: &[u8] = b"parley-ratchet-send-init-v1";

/// Prefix that keeps X3DH input distinct from a bare X25519 output
const X3DH_PREFIX: [u8; 32] = [0xFF; 32];

/// Derive the X3DH shared secret from the concatenated DH outputs.
pub(crate) fn x3dh_secret(dh_outputs: &[[u8; 32]]) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(32 * (dh_outputs.len() + 1));
    ikm.extend_from_slice(&X3DH_PREFIX);
    for output in dh_outputs {
        ikm.extend_from_slice(output);
    }

    let secret = derive_key(&ikm, Some([0u8; 32].as_slice()), X3DH_INFO);
    ikm.zeroize();
    secret
}

/// One root-chain step: `(new_root_key, chain_key)`.
pub(crate) fn root_step(root_key: &[u8; 32], dh_output: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    derive_key_pair(dh_output, Some(root_key.as_slice()), ROOT_INFO)
}

/// Sending chain for a state that has none yet.
pub(crate) fn initial_send_chain(root_key: &[u8; 32]) -> [u8; 32] {
    derive_key(root_key, None, SEND_CHAIN_INIT_INFO)
}

/// Advance `chain_key` in place and return the message key.
pub(crate) fn next_message_key(chain_key: &mut [u8; 32]) -> [u8; 32] {
    let (next, message_key) = chain_step(chain_key);
    *chain_key = next;
    message_key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourth_dh_changes_the_secret() {
        let three = x3dh_secret(&[[1; 32], [2; 32], [3; 32]]);
        let four = x3dh_secret(&[[1; 32], [2; 32], [3; 32], [4; 32]]);

        assert_ne!(three, four);
    }

    #[test]
    fn dh_order_matters() {
        assert_ne!(x3dh_secret(&[[1; 32], [2; 32], [3; 32]]), x3dh_secret(&[[2; 32], [1; 32], [3; 32]]));
    }

    #[test]
    fn root_step_outputs_are_independent() {
        let (root, chain) = root_step(&[1; 32], &[2; 32]);

        assert_ne!(root, chain);
        assert_ne!(root, [1; 32]);
    }

    #[test]
    fn chain_advances_in_place() {
        let mut chain = [9; 32];
        let first = next_message_key(&mut chain);
        let second = next_message_key(&mut chain);

        assert_ne!(first, second);
        assert_ne!(chain, [9; 32]);
    }

    #[test]
    fn seed_label_is_distinct_from_root_step() {
        let root = [5; 32];
        let (_, chain) = root_step(&root, &[0; 32]);

        assert_ne!(initial_send_chain(&root), chain);
    }
}
