//! X3DH key agreement.
//!
//! The initiator consumes a peer's [`PreKeyBundle`] and an ephemeral key and
//! gets back a ready-to-use [`RatchetState`] plus a [`SessionInit`] to send
//! alongside its first message. The responder feeds that [`SessionInit`] and
//! its own prekeys to [`accept_session`] to reach the matching state.
//!
//! ```text
//! Initiator (A)                                   Responder (B)
//!   DH1 = DH(EK_A,  SPK_B)                          DH(SPK_B, EK_A)
//!   DH2 = DH(EK_A,  IK_B)                           DH(IK_B,  EK_A)
//!   DH3 = DH(IK_A,  SPK_B)                          DH(SPK_B, IK_A)
//!   DH4 = DH(EK_A,  OPK_B)   (if present)           DH(OPK_B, EK_A)
//!   SK  = HKDF(DH1 || DH2 || DH3 [|| DH4])
//!
//!   base ratchet key R_A, then one ratchet step     (RK, CKs) = KDF(SK, DH(SPK_B, R_A))
//!   against SPK_B as the remote ratchet key
//! ```
//!
//! Both sides bind `IK_A || IK_B` into every message as associated data.

use parley_crypto::Environment;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    error::SessionError,
    identity::{self, IDENTITY_KEY_SIZE, IdentityKeyPair},
    keys::{DH_KEY_SIZE, DhKeyPair, hex_prefix},
    prekey::{OneTimePreKey, PreKeyBundle, SignedPreKey},
    ratchet::{
        RatchetState,
        chain::{root_step, x3dh_secret},
        dh_ratchet_step,
    },
};

/// Handshake parameters the initiator sends with its first message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInit {
    /// Initiator's Ed25519 identity key
    pub identity_key: [u8; IDENTITY_KEY_SIZE],
    /// Initiator's ephemeral X25519 key
    pub ephemeral_key: [u8; DH_KEY_SIZE],
    /// Initiator's first ratchet key, the one it stepped from
    pub base_ratchet_key: [u8; DH_KEY_SIZE],
    /// Responder's signed prekey the initiator used
    pub signed_prekey_id: u32,
    /// Responder's one-time prekey the initiator used, if any
    pub one_time_prekey_id: Option<u32>,
}

/// Start a session with the owner of `bundle`.
///
/// `ephemeral` is consumed and dropped (zeroized) before returning; it must
/// be freshly generated for every handshake.
///
/// # Errors
///
/// - Validation errors for malformed bundle fields
/// - `InvalidSignature` if the signed prekey is not signed by the bundle's
///   identity key; no state is produced
/// - `InvalidPublicKey` for low-order bundle keys
pub fn create_session_from_prekey_bundle<E: Environment>(
    identity: &IdentityKeyPair,
    ephemeral: DhKeyPair,
    bundle: &PreKeyBundle,
    env: &E,
) -> Result<(RatchetState, SessionInit), SessionError> {
    let remote = bundle.verify()?;

    let mut dh = vec![
        ephemeral.agree(&remote.signed_prekey)?,
        ephemeral.agree(&remote.identity_dh)?,
        identity.agree(&remote.signed_prekey)?,
    ];
    if let Some((_, one_time)) = remote.one_time_prekey {
        dh.push(ephemeral.agree(&one_time)?);
    }
    let shared = x3dh_secret(&dh);
    dh.zeroize();

    let base_ratchet = DhKeyPair::generate(env)?;
    let base_ratchet_key = *base_ratchet.public();
    let local_identity = identity.public_key();

    let mut state = RatchetState::new(
        shared,
        base_ratchet,
        session_associated_data(&local_identity, &remote.identity_key),
        remote.identity_key,
        env.wall_clock_secs(),
    );
    dh_ratchet_step(&mut state, remote.signed_prekey, env)?;

    let init = SessionInit {
        identity_key: local_identity,
        ephemeral_key: *ephemeral.public(),
        base_ratchet_key,
        signed_prekey_id: remote.signed_prekey_id,
        one_time_prekey_id: remote.one_time_prekey.map(|(id, _)| id),
    };
    drop(ephemeral);

    tracing::debug!(
        remote = %hex_prefix(&remote.identity_key),
        signed_prekey_id = init.signed_prekey_id,
        one_time_prekey_id = ?init.one_time_prekey_id,
        "created session from prekey bundle"
    );
    Ok((state, init))
}

/// Complete a session started by a peer's [`SessionInit`].
///
/// `one_time_prekey` must be the key named by `init`, and the caller must
/// delete it from storage once this returns successfully.
///
/// # Errors
///
/// - `PreKeyMismatch` if `init` names different prekeys than supplied
/// - `InvalidKeyLength` / `InvalidIdentityKey` for a malformed identity key
/// - `InvalidPublicKey` for low-order handshake keys
pub fn accept_session<E: Environment>(
    identity: &IdentityKeyPair,
    signed_prekey: &SignedPreKey,
    one_time_prekey: Option<&OneTimePreKey>,
    init: &SessionInit,
    env: &E,
) -> Result<RatchetState, SessionError> {
    if init.signed_prekey_id != signed_prekey.id {
        return Err(SessionError::PreKeyMismatch {
            what: "signed prekey",
            expected: Some(signed_prekey.id),
            actual: Some(init.signed_prekey_id),
        });
    }
    let one_time_id = one_time_prekey.map(|key| key.id);
    if init.one_time_prekey_id != one_time_id {
        return Err(SessionError::PreKeyMismatch {
            what: "one-time prekey",
            expected: one_time_id,
            actual: init.one_time_prekey_id,
        });
    }

    let initiator = identity::verifying_key(&init.identity_key)?;

    let mut dh = vec![
        signed_prekey.key_pair.agree(&init.ephemeral_key)?,
        identity.agree(&init.ephemeral_key)?,
        signed_prekey.key_pair.agree(&identity::dh_public(&initiator))?,
    ];
    if let Some(one_time) = one_time_prekey {
        dh.push(one_time.key_pair.agree(&init.ephemeral_key)?);
    }
    let shared = x3dh_secret(&dh);
    dh.zeroize();

    let mut first_dh = signed_prekey.key_pair.agree(&init.base_ratchet_key)?;
    let (root_key, send_chain) = root_step(&shared, &first_dh);
    first_dh.zeroize();

    let mut state = RatchetState::new(
        root_key,
        signed_prekey.key_pair.clone(),
        session_associated_data(&init.identity_key, &identity.public_key()),
        init.identity_key,
        env.wall_clock_secs(),
    );
    state.send_chain_key = Some(send_chain);
    state.remote_ratchet_key = Some(init.base_ratchet_key);

    tracing::debug!(
        remote = %hex_prefix(&init.identity_key),
        signed_prekey_id = init.signed_prekey_id,
        one_time_prekey_id = ?init.one_time_prekey_id,
        "accepted session"
    );
    Ok(state)
}

/// `IK_initiator || IK_responder`
fn session_associated_data(
    initiator: &[u8; IDENTITY_KEY_SIZE],
    responder: &[u8; IDENTITY_KEY_SIZE],
) -> Vec<u8> {
    let mut ad = Vec::with_capacity(2 * IDENTITY_KEY_SIZE);
    ad.extend_from_slice(initiator);
    ad.extend_from_slice(responder);
    ad
}
