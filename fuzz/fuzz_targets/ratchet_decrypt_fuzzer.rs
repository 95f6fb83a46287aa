//! Fuzz target for Double Ratchet decryption
//!
//! Drives a live session with a mix of genuine messages (delivered, dropped,
//! replayed, reordered) and adversarial ones (mutated headers, ciphertexts
//! and nonces).
//!
//! # Invariants
//!
//! - Decrypt never panics
//! - A failed decrypt leaves the state byte-for-byte unchanged
//! - A genuine message decrypts to its plaintext at most once
//! - Mutated messages never decrypt

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_crypto::env::test_utils::SeededEnv;
use parley_session::{
    accept_session, create_session_from_prekey_bundle, DhKeyPair, DoubleRatchet,
    EncryptedMessage, IdentityKeyPair, PreKeyBundle, RatchetState, SignedPreKey,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    /// Encrypt on one side and queue the message
    Send { from_alice: bool, plaintext: Vec<u8> },
    /// Deliver a queued message (index modulo queue length)
    Deliver { index: u8 },
    /// Deliver a queued message after mutating it
    Tamper { index: u8, mutation: Mutation },
}

#[derive(Debug, Arbitrary)]
enum Mutation {
    Counter(u32),
    PreviousCounter(u32),
    RatchetKey([u8; 32]),
    FlipCiphertext { position: u16, bit: u8 },
    Nonce([u8; 12]),
    Truncate(u16),
}

struct Sent {
    to_bob: bool,
    message: EncryptedMessage,
    plaintext: Vec<u8>,
    delivered: bool,
}

fn establish(seed: u64) -> Option<(DoubleRatchet<SeededEnv>, RatchetState, RatchetState)> {
    let env = SeededEnv::new(seed);
    let bob_identity = IdentityKeyPair::generate(&env).ok()?;
    let signed = SignedPreKey::generate(&bob_identity, 1, &env).ok()?;
    let bundle = PreKeyBundle::new(&bob_identity, &signed, None);

    let alice_identity = IdentityKeyPair::generate(&env).ok()?;
    let ephemeral = DhKeyPair::generate(&env).ok()?;
    let (alice, init) =
        create_session_from_prekey_bundle(&alice_identity, ephemeral, &bundle, &env).ok()?;
    let bob = accept_session(&bob_identity, &signed, None, &init, &env).ok()?;
    Some((DoubleRatchet::new(env), alice, bob))
}

fn mutate(message: &mut EncryptedMessage, mutation: &Mutation) -> bool {
    match *mutation {
        Mutation::Counter(c) if c != message.header.counter => message.header.counter = c,
        Mutation::PreviousCounter(pn) if pn != message.header.pn => message.header.pn = pn,
        Mutation::RatchetKey(key) if key != message.header.dh => message.header.dh = key,
        Mutation::FlipCiphertext { position, bit } if !message.ciphertext.is_empty() => {
            let index = position as usize % message.ciphertext.len();
            message.ciphertext[index] ^= 1 << (bit % 8);
        },
        Mutation::Nonce(nonce) if nonce != message.nonce => message.nonce = nonce,
        Mutation::Truncate(len) if (len as usize) < message.ciphertext.len() => {
            message.ciphertext.truncate(len as usize);
        },
        _ => return false,
    }
    true
}

fuzz_target!(|scenario: Scenario| {
    let Some((engine, mut alice, mut bob)) = establish(scenario.seed) else {
        return;
    };
    let mut queue: Vec<Sent> = Vec::new();

    for operation in scenario.operations.into_iter().take(64) {
        match operation {
            Operation::Send { from_alice, plaintext } => {
                let sender = if from_alice { &mut alice } else { &mut bob };
                let message = engine.encrypt(sender, &plaintext).expect("encrypt must succeed");
                queue.push(Sent { to_bob: from_alice, message, plaintext, delivered: false });
            },
            Operation::Deliver { index } => {
                if queue.is_empty() {
                    continue;
                }
                let sent = &mut queue[index as usize % queue.len()];
                let receiver = if sent.to_bob { &mut bob } else { &mut alice };
                let before = receiver.clone();

                match engine.decrypt(receiver, &sent.message) {
                    Ok(plaintext) => {
                        assert!(!sent.delivered, "message decrypted twice");
                        assert_eq!(plaintext, sent.plaintext);
                        sent.delivered = true;
                    },
                    Err(_) => assert_eq!(*receiver, before, "failed decrypt changed state"),
                }
            },
            Operation::Tamper { index, mutation } => {
                if queue.is_empty() {
                    continue;
                }
                let sent = &queue[index as usize % queue.len()];
                let mut message = sent.message.clone();
                if !mutate(&mut message, &mutation) {
                    continue;
                }
                let receiver = if sent.to_bob { &mut bob } else { &mut alice };
                let before = receiver.clone();

                assert!(engine.decrypt(receiver, &message).is_err(), "tampered message accepted");
                assert_eq!(*receiver, before, "failed decrypt changed state");
            },
        }
    }
});
