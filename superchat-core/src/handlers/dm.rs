//! Direct-message key agreement and consent handlers (§4.6).
//!
//! Two independent paths share the `START_DM` entry point:
//!
//! - **Encrypted handshake** (steps 1-4): the DM channel is created
//!   immediately so `KEY_REQUIRED`/`ALLOW_UNENCRYPTED` always have a
//!   concrete channel id to reference, and is registered in
//!   [`Engine`]'s `pending_dms` map until both sides have a key (or the
//!   initiator gives up on encryption via `ALLOW_UNENCRYPTED`).
//! - **Unencrypted consent** (step 6): no channel exists until
//!   `ACCEPT_UNENCRYPTED` — only a [`crate::memdb::DmInvite`] row. The
//!   wire's `channel_id` field on `DM_PENDING`/`DM_REQUEST`/
//!   `ACCEPT_UNENCRYPTED`/`DECLINE_DM` carries the invite's id in this
//!   path, not a channel id, since no channel exists yet to name.
//!
//! `DmParty` is how both paths refer to "whichever side of the DM this
//! is" without caring whether it is an authenticated user or a bare
//! anonymous session.

use std::sync::Arc;

use superchat_codec::primitive::ScBytes;
use superchat_common::{ChannelId, ChannelType, SessionId, SuperchatError, UserId};
use superchat_codec::messages::{
    AcceptUnencryptedMsg, AllowUnencryptedMsg, DeclineDmMsg, DmDeclinedMsg, DmPendingMsg,
    DmReadyMsg, DmRequestMsg, KeyRequiredMsg, ProvidePublicKeyMsg, ServerMessage, StartDmMsg,
    UploadPublicKeyMsg,
};

use super::{reply, reply_error, Engine};
use crate::memdb::Channel;
use crate::session::{Session, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum DmParty {
    Authenticated(UserId),
    Anonymous(SessionId),
}

#[derive(Debug, Clone)]
pub(super) struct PendingDm {
    party_a: DmParty,
    party_b: DmParty,
}

async fn party_for(session: &Session) -> DmParty {
    match session.user_id().await {
        Some(uid) => DmParty::Authenticated(uid),
        None => DmParty::Anonymous(session.id),
    }
}

fn party_user_id(party: &DmParty) -> Option<UserId> {
    match party {
        DmParty::Authenticated(uid) => Some(*uid),
        DmParty::Anonymous(_) => None,
    }
}

fn party_session_id(party: &DmParty) -> Option<SessionId> {
    match party {
        DmParty::Anonymous(sid) => Some(*sid),
        DmParty::Authenticated(_) => None,
    }
}

fn invite_party(user_id: Option<UserId>, session_id: Option<SessionId>) -> DmParty {
    match user_id {
        Some(uid) => DmParty::Authenticated(uid),
        None => DmParty::Anonymous(session_id.expect("DmInvite requires a user or session")),
    }
}

async fn party_key(engine: &Engine, party: &DmParty) -> Option<[u8; 32]> {
    let raw = match party {
        DmParty::Authenticated(uid) => engine.memdb.get_user(*uid).await?.encryption_public_key,
        DmParty::Anonymous(sid) => {
            return engine.sessions.get(*sid)?.encryption_public_key().await;
        }
    };
    raw.and_then(|v| v.try_into().ok())
}

async fn party_nickname(engine: &Engine, party: &DmParty) -> String {
    match party {
        DmParty::Authenticated(uid) => {
            engine.memdb.get_user(*uid).await.map(|u| u.nickname).unwrap_or_default()
        }
        DmParty::Anonymous(sid) => match engine.sessions.get(*sid) {
            Some(s) => super::presence::display_nickname(&s).await,
            None => String::new(),
        },
    }
}

/// Finds the live session whose id's low 64 bits match the wire's
/// `target_session` field. Session ids are full UUIDs internally
/// (§3: globally unique across restarts) but the wire format only
/// carries a `u64` — an Open Question the spec leaves unresolved;
/// truncating to the low half is the same tradeoff the codec already
/// makes for channel/message ids, which are plain `i64`s cast to `u64`.
fn find_session_by_wire_id(engine: &Engine, raw: u64) -> Option<SessionId> {
    engine.sessions.iter().into_iter().find(|s| s.id.as_u64_pair().1 == raw).map(|s| s.id)
}

/// Delivers `msg` to every live session behind `party` — for an
/// anonymous party that's the one session it names; for an
/// authenticated party it's every currently-connected session signed in
/// as that user (multiple devices are not excluded by the spec).
async fn deliver_to_party(engine: &Engine, party: &DmParty, msg: &ServerMessage) {
    match party {
        DmParty::Anonymous(sid) => {
            if let Some(session) = engine.sessions.get(*sid) {
                let _ = reply(&session, msg);
            }
        }
        DmParty::Authenticated(uid) => {
            for session in engine.sessions.iter() {
                if session.user_id().await == Some(*uid) {
                    let _ = reply(&session, msg);
                }
            }
        }
    }
}

async fn create_dm_channel(engine: &Engine, a: &DmParty, b: &DmParty) -> Result<Channel, SuperchatError> {
    let channel = engine
        .memdb
        .create_channel("", "", ChannelType::Chat as u8, 0, None, party_user_id(a), true, true)
        .await?;
    let nick_a = party_nickname(engine, a).await;
    engine
        .memdb
        .add_participant(channel.id, party_user_id(a), party_session_id(a), &nick_a, false)
        .await?;
    let nick_b = party_nickname(engine, b).await;
    engine
        .memdb
        .add_participant(channel.id, party_user_id(b), party_session_id(b), &nick_b, false)
        .await?;
    Ok(channel)
}

/// Sends `DM_READY` to both sides of a completed handshake and clears
/// any pending-key bookkeeping for the channel (§4.6 step 3). `peer_key`
/// is empty when the channel was forced unencrypted.
async fn complete_ready(engine: &Engine, a: &DmParty, b: &DmParty, channel_id: ChannelId) {
    let a_key = party_key(engine, a).await.map(|k| k.to_vec()).unwrap_or_default();
    let b_key = party_key(engine, b).await.map(|k| k.to_vec()).unwrap_or_default();
    deliver_to_party(
        engine,
        a,
        &ServerMessage::DmReady(DmReadyMsg {
            channel_id: channel_id as u64,
            peer_user_id: party_user_id(b),
            peer_public_key: ScBytes(b_key),
        }),
    )
    .await;
    deliver_to_party(
        engine,
        b,
        &ServerMessage::DmReady(DmReadyMsg {
            channel_id: channel_id as u64,
            peer_user_id: party_user_id(a),
            peer_public_key: ScBytes(a_key),
        }),
    )
    .await;
    engine.pending_dms.remove(&channel_id);
}

pub async fn handle_start_dm(
    engine: &Engine,
    session: &Arc<Session>,
    msg: StartDmMsg,
) -> Result<(), SuperchatError> {
    if session.state().await == SessionState::Connected {
        return reply_error(session, &SuperchatError::Unauthenticated);
    }
    let initiator = party_for(session).await;

    let target = if let Some(uid) = msg.target_user {
        let uid = uid as UserId;
        if engine.memdb.get_user(uid).await.is_none() {
            return reply_error(session, &SuperchatError::UserNotFound(uid.to_string()));
        }
        DmParty::Authenticated(uid)
    } else if let Some(raw) = msg.target_session {
        match find_session_by_wire_id(engine, raw) {
            Some(sid) => DmParty::Anonymous(sid),
            None => {
                return reply_error(
                    session,
                    &SuperchatError::InvalidMessage("target_session not connected".to_owned()),
                )
            }
        }
    } else {
        return reply_error(session, &SuperchatError::MissingField("target_user or target_session"));
    };

    if initiator == target {
        return reply_error(
            session,
            &SuperchatError::InvalidMessage("cannot start a DM with yourself".to_owned()),
        );
    }

    if let (DmParty::Authenticated(a), DmParty::Authenticated(b)) = (&initiator, &target) {
        if let Some(existing) = engine.memdb.find_dm_channel(*a, *b).await {
            complete_ready(engine, &initiator, &target, existing.id).await;
            return Ok(());
        }
    }

    let initiator_has_key = party_key(engine, &initiator).await.is_some();
    let target_has_key = party_key(engine, &target).await.is_some();

    if initiator_has_key && target_has_key {
        let channel = create_dm_channel(engine, &initiator, &target).await?;
        complete_ready(engine, &initiator, &target, channel.id).await;
        return Ok(());
    }

    if msg.allow_unencrypted != 0 {
        let invite = engine
            .memdb
            .create_dm_invite(
                party_user_id(&initiator),
                party_session_id(&initiator),
                party_user_id(&target),
                party_session_id(&target),
                false,
            )
            .await;
        reply(
            session,
            &ServerMessage::DmPending(DmPendingMsg {
                channel_id: invite.id as u64,
                target_nickname: party_nickname(engine, &target).await.into(),
            }),
        )?;
        deliver_to_party(
            engine,
            &target,
            &ServerMessage::DmRequest(DmRequestMsg {
                channel_id: invite.id as u64,
                initiator_nickname: party_nickname(engine, &initiator).await.into(),
                allow_unencrypted: 1,
            }),
        )
        .await;
        return Ok(());
    }

    let channel = create_dm_channel(engine, &initiator, &target).await?;
    engine
        .pending_dms
        .insert(channel.id, PendingDm { party_a: initiator.clone(), party_b: target.clone() });
    if !initiator_has_key {
        deliver_to_party(
            engine,
            &initiator,
            &ServerMessage::KeyRequired(KeyRequiredMsg {
                channel_id: Some(channel.id as u64),
                peer_user_id: party_user_id(&target),
            }),
        )
        .await;
    }
    if !target_has_key {
        deliver_to_party(
            engine,
            &target,
            &ServerMessage::KeyRequired(KeyRequiredMsg {
                channel_id: Some(channel.id as u64),
                peer_user_id: party_user_id(&initiator),
            }),
        )
        .await;
    }
    Ok(())
}

async fn set_key_and_retry_pending(
    engine: &Engine,
    session: &Arc<Session>,
    key_bytes: Vec<u8>,
) -> Result<(), SuperchatError> {
    let key: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| SuperchatError::InvalidMessage("public key must be 32 bytes".to_owned()))?;
    match session.user_id().await {
        Some(uid) => engine.memdb.set_user_public_key(uid, key).await?,
        None => session.set_encryption_public_key(key).await,
    }

    let self_party = party_for(session).await;
    let ready: Vec<(ChannelId, DmParty, DmParty)> = {
        let mut out = Vec::new();
        for entry in engine.pending_dms.iter() {
            let pending = entry.value();
            if pending.party_a == self_party || pending.party_b == self_party {
                let a_ready = party_key(engine, &pending.party_a).await.is_some();
                let b_ready = party_key(engine, &pending.party_b).await.is_some();
                if a_ready && b_ready {
                    out.push((*entry.key(), pending.party_a.clone(), pending.party_b.clone()));
                }
            }
        }
        out
    };
    for (channel_id, a, b) in ready {
        complete_ready(engine, &a, &b, channel_id).await;
    }
    Ok(())
}

pub async fn handle_provide_public_key(
    engine: &Engine,
    session: &Arc<Session>,
    msg: ProvidePublicKeyMsg,
) -> Result<(), SuperchatError> {
    set_key_and_retry_pending(engine, session, msg.public_key.0).await
}

pub async fn handle_upload_public_key(
    engine: &Engine,
    session: &Arc<Session>,
    msg: UploadPublicKeyMsg,
) -> Result<(), SuperchatError> {
    set_key_and_retry_pending(engine, session, msg.public_key.0).await
}

/// The initiator gives up on waiting for a peer's key and forces the
/// still-pending encrypted-handshake channel to go unencrypted (§4.6
/// step 6's escape hatch for the encrypted path).
pub async fn handle_allow_unencrypted(
    engine: &Engine,
    session: &Arc<Session>,
    msg: AllowUnencryptedMsg,
) -> Result<(), SuperchatError> {
    let channel_id = msg.channel_id as ChannelId;
    let Some((_, pending)) = engine.pending_dms.remove(&channel_id) else {
        return reply_error(session, &SuperchatError::ChannelNotFound(channel_id));
    };
    deliver_to_party(
        engine,
        &pending.party_a,
        &ServerMessage::DmReady(DmReadyMsg {
            channel_id: channel_id as u64,
            peer_user_id: party_user_id(&pending.party_b),
            peer_public_key: ScBytes(Vec::new()),
        }),
    )
    .await;
    deliver_to_party(
        engine,
        &pending.party_b,
        &ServerMessage::DmReady(DmReadyMsg {
            channel_id: channel_id as u64,
            peer_user_id: party_user_id(&pending.party_a),
            peer_public_key: ScBytes(Vec::new()),
        }),
    )
    .await;
    Ok(())
}

/// Materializes the unencrypted-consent invite into a real DM channel
/// (§4.6 step 6). `msg.channel_id` is the invite id, not a channel id —
/// see the module doc comment.
pub async fn handle_accept_unencrypted(
    engine: &Engine,
    session: &Arc<Session>,
    msg: AcceptUnencryptedMsg,
) -> Result<(), SuperchatError> {
    let invite_id = msg.channel_id as i64;
    let Some(invite) = engine.memdb.take_dm_invite(invite_id).await else {
        return reply_error(session, &SuperchatError::ChannelNotFound(invite_id));
    };
    let initiator = invite_party(invite.initiator_user_id, invite.initiator_session_id);
    let target = invite_party(invite.target_user_id, invite.target_session_id);
    let channel = create_dm_channel(engine, &initiator, &target).await?;
    deliver_to_party(
        engine,
        &initiator,
        &ServerMessage::DmReady(DmReadyMsg {
            channel_id: channel.id as u64,
            peer_user_id: party_user_id(&target),
            peer_public_key: ScBytes(Vec::new()),
        }),
    )
    .await;
    deliver_to_party(
        engine,
        &target,
        &ServerMessage::DmReady(DmReadyMsg {
            channel_id: channel.id as u64,
            peer_user_id: party_user_id(&initiator),
            peer_public_key: ScBytes(Vec::new()),
        }),
    )
    .await;
    Ok(())
}

/// Removes the invite and tells the initiator (§4.6 step 6: "on
/// DECLINE_DM the invite is deleted and DM_DECLINED is sent to the
/// initiator").
pub async fn handle_decline_dm(
    engine: &Engine,
    session: &Arc<Session>,
    msg: DeclineDmMsg,
) -> Result<(), SuperchatError> {
    let invite_id = msg.channel_id as i64;
    let Some(invite) = engine.memdb.take_dm_invite(invite_id).await else {
        return reply_error(session, &SuperchatError::ChannelNotFound(invite_id));
    };
    let initiator = invite_party(invite.initiator_user_id, invite.initiator_session_id);
    let decliner_nickname = super::presence::display_nickname(session).await;
    deliver_to_party(
        engine,
        &initiator,
        &ServerMessage::DmDeclined(DmDeclinedMsg { channel_id: msg.channel_id, nickname: decliner_nickname.into() }),
    )
    .await;
    Ok(())
}
