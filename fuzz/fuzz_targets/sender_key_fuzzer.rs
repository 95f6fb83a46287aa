//! Fuzz target for the sender-key ring
//!
//! # Invariants
//!
//! - Ring operations never panic
//! - Messages under retained versions always decrypt
//! - Forged or corrupted messages never decrypt
//! - Installing a stale version is always rejected

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_crypto::{
    env::test_utils::SeededEnv, SenderKey, SenderKeyMessage, SenderKeyRing,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    retention: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Encrypt(Vec<u8>),
    Rotate,
    InstallStale { key: [u8; 32], version: u32 },
    Forge { version: u32, nonce: [u8; 12], ciphertext: Vec<u8> },
    Corrupt { index: u8, position: u16 },
}

fuzz_target!(|scenario: Scenario| {
    let env = SeededEnv::new(scenario.seed);
    let Ok(key) = SenderKey::generate(&env) else {
        return;
    };
    let mut ring = SenderKeyRing::with_retention(key, usize::from(scenario.retention % 8));
    let mut sent: Vec<(SenderKeyMessage, Vec<u8>)> = Vec::new();

    for operation in scenario.operations.into_iter().take(64) {
        match operation {
            Operation::Encrypt(plaintext) => {
                let message = ring.encrypt(&plaintext, &env).expect("encrypt must succeed");
                assert_eq!(ring.decrypt(&message).expect("fresh message"), plaintext);
                sent.push((message, plaintext));
            },
            Operation::Rotate => {
                ring.rotate(&env).expect("rotate must succeed");
            },
            Operation::InstallStale { key, version } => {
                let stale = version.min(ring.current_version());
                assert!(ring.install(SenderKey::from_parts(key, stale)).is_err());
            },
            Operation::Forge { version, nonce, ciphertext } => {
                let forged = SenderKeyMessage { version, nonce, ciphertext };
                assert!(ring.decrypt(&forged).is_err());
            },
            Operation::Corrupt { index, position } => {
                if sent.is_empty() {
                    continue;
                }
                let (message, _) = &sent[index as usize % sent.len()];
                let mut corrupted = message.clone();
                let at = position as usize % corrupted.ciphertext.len();
                corrupted.ciphertext[at] ^= 0x01;
                assert!(ring.decrypt(&corrupted).is_err());
            },
        }
    }

    let retained = ring.versions();
    for (message, plaintext) in &sent {
        if retained.contains(&message.version) {
            assert_eq!(&ring.decrypt(message).expect("retained version"), plaintext);
        }
    }
});
