//! Tests for the load → operate → persist boundary.
//!
//! These tests verify:
//! - `transact` persists the state an operation produced
//! - A failed operation persists nothing
//! - Two writers racing on one session cannot both commit

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Fixture helpers outside #[test] fns")]

use parley_crypto::{CryptoError, env::test_utils::SeededEnv};
use parley_session::{
    DhKeyPair, DoubleRatchet, IdentityKeyPair, MemorySessionStore, PreKeyBundle, SessionError,
    SessionId, SessionStore, SignedPreKey, StoreError, accept_session,
    create_session_from_prekey_bundle,
    store::{create, transact},
};

struct World {
    engine: DoubleRatchet<SeededEnv>,
    store: MemorySessionStore,
    alice: SessionId,
    bob: SessionId,
}

fn world() -> World {
    let env = SeededEnv::new(42);
    let bob_identity = IdentityKeyPair::generate(&env).expect("identity");
    let signed = SignedPreKey::generate(&bob_identity, 1, &env).expect("signed prekey");
    let bundle = PreKeyBundle::new(&bob_identity, &signed, None);

    let alice_identity = IdentityKeyPair::generate(&env).expect("identity");
    let ephemeral = DhKeyPair::generate(&env).expect("ephemeral");
    let (alice_state, init) =
        create_session_from_prekey_bundle(&alice_identity, ephemeral, &bundle, &env)
            .expect("handshake");
    let bob_state = accept_session(&bob_identity, &signed, None, &init, &env).expect("accept");

    let store = MemorySessionStore::new();
    let alice = SessionId::new("alice", "bob");
    let bob = SessionId::new("bob", "alice");
    create(&store, &alice, &alice_state).expect("persist alice");
    create(&store, &bob, &bob_state).expect("persist bob");

    World { engine: DoubleRatchet::new(env), store, alice, bob }
}

#[test]
fn transact_persists_each_step() {
    let w = world();

    let message = transact(&w.store, &w.alice, |state| w.engine.encrypt(state, b"stored"))
        .expect("encrypt and persist");
    let plaintext = transact(&w.store, &w.bob, |state| w.engine.decrypt(state, &message))
        .expect("decrypt and persist");

    assert_eq!(plaintext, b"stored");
    assert_eq!(w.store.load(&w.alice).expect("load").expect("present").version, 2);
    assert_eq!(w.store.load(&w.bob).expect("load").expect("present").state.recv_counter(), 1);
}

#[test]
fn failed_operation_persists_nothing() {
    let w = world();
    let mut message =
        transact(&w.store, &w.alice, |state| w.engine.encrypt(state, b"x")).expect("encrypt");
    message.ciphertext[0] ^= 1;

    let before = w.store.load(&w.bob).expect("load").expect("present");
    let result = transact(&w.store, &w.bob, |state| w.engine.decrypt(state, &message));
    let after = w.store.load(&w.bob).expect("load").expect("present");

    assert_eq!(result, Err(SessionError::Crypto(CryptoError::AuthenticationFailed)));
    assert_eq!(before, after);
}

#[test]
fn concurrent_writer_is_detected() {
    let w = world();

    let stale = w.store.load(&w.alice).expect("load").expect("present");
    let mut racing = stale.state.clone();

    transact(&w.store, &w.alice, |state| w.engine.encrypt(state, b"winner")).expect("winner");
    w.engine.encrypt(&mut racing, b"loser").expect("encrypt on stale copy");

    let result = w.store.compare_and_swap(&w.alice, Some(stale.version), &racing);
    assert_eq!(result, Err(StoreError::Conflict { expected: Some(1), actual: Some(2) }));
}

#[test]
fn conflict_inside_transact_is_retryable() {
    let w = world();

    let result = transact(&w.store, &w.alice, |state| {
        // Another device commits while this operation is in flight
        let interloper = w.store.load(&w.alice)?.ok_or(SessionError::NoSession)?;
        w.store.compare_and_swap(&w.alice, Some(interloper.version), &interloper.state)?;
        w.engine.encrypt(state, b"late")
    });

    let err = result.expect_err("commit must lose the race");
    assert!(matches!(err, SessionError::Store(StoreError::Conflict { .. })));
    assert!(!err.is_fatal());
}

#[test]
fn missing_session_is_reported() {
    let w = world();
    let stranger = SessionId::new("alice", "mallory");

    let result = transact(&w.store, &stranger, |state| w.engine.encrypt(state, b"hi"));
    assert!(matches!(result, Err(SessionError::NoSession)));
}

#[test]
fn duplicate_create_conflicts() {
    let w = world();
    let existing = w.store.load(&w.alice).expect("load").expect("present");

    let result = create(&w.store, &w.alice, &existing.state);
    assert_eq!(
        result,
        Err(SessionError::Store(StoreError::Conflict { expected: None, actual: Some(1) }))
    );
}
