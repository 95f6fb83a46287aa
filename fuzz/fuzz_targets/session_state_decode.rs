//! Fuzz target for persisted session state decoding
//!
//! Persisted states come back from collaborator storage and may be truncated
//! or corrupted.
//!
//! # Invariants
//!
//! - Decoding arbitrary bytes never panics (JSON and CBOR)
//! - Anything that decodes re-encodes and decodes to an equal state
//! - A decoded state can be used for encrypt without panicking

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_crypto::env::test_utils::SeededEnv;
use parley_session::{DoubleRatchet, RatchetState};

fuzz_target!(|data: &[u8]| {
    let engine = DoubleRatchet::new(SeededEnv::new(0));

    for decoded in [RatchetState::from_json(data), RatchetState::from_cbor(data)] {
        let Ok(mut state) = decoded else {
            continue;
        };

        let json = state.to_json().expect("decoded state must re-encode");
        let again = RatchetState::from_json(&json).expect("re-encoded state must decode");
        assert_eq!(again, state);

        let _ = engine.encrypt(&mut state, b"after decode");
    }
});
