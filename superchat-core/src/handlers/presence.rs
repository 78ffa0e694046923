//! Identity and roster handlers (§4.2 session state machine, §4.4
//! server-presence subscription): `SET_NICKNAME`, `AUTH_REQUEST`,
//! `REGISTER_USER`, `PING`, `SUBSCRIBE_SERVER_PRESENCE`, plus the
//! session-teardown path shared by an explicit `DISCONNECT` and a
//! transport noticing the socket died.

use std::sync::Arc;

use superchat_codec::messages::{
    AuthRequestMsg, AuthResponseMsg, NicknameResponseMsg, PingMsg, PongMsg, RegisterResponseMsg,
    RegisterUserMsg, ServerMessage, ServerPresenceMsg, ServerPresenceUserMsg, SetNicknameMsg,
    SubscribeOkMsg,
};
use superchat_common::SuperchatError;

use super::{reply, reply_error, Engine};
use crate::auth;
use crate::session::{Session, SessionState};

/// Renders a session's identity the way broadcasts and message authorship
/// show it (§4.2: "Anonymous sessions render as `~nickname`"; glossary:
/// "rendered with a `~` prefix").
pub async fn display_nickname(session: &Session) -> String {
    let nickname = session.nickname().await.unwrap_or_default();
    if session.state().await == SessionState::Authenticated {
        nickname
    } else {
        format!("~{nickname}")
    }
}

pub async fn handle_set_nickname(
    engine: &Engine,
    session: &Arc<Session>,
    msg: SetNicknameMsg,
) -> Result<(), SuperchatError> {
    let nickname = msg.nickname.trim();
    if nickname.is_empty() {
        return reply_error(session, &SuperchatError::MissingField("nickname"));
    }
    if nickname.len() > 32 {
        return reply_error(session, &SuperchatError::TooLong("nickname"));
    }
    // An authenticated session's nickname is the account's nickname;
    // SET_NICKNAME only governs the anonymous path.
    if session.state().await == SessionState::Authenticated {
        return reply_error(session, &SuperchatError::Forbidden);
    }
    if engine.memdb.get_user_by_nickname(nickname).await.is_some() {
        return reply_error(
            session,
            &SuperchatError::NameInUse(nickname.to_owned()),
        );
    }
    session.set_nickname(nickname.to_owned()).await;
    if session.state().await == SessionState::Connected {
        session.set_state(SessionState::Named).await;
    }
    reply(
        session,
        &ServerMessage::NicknameResponse(NicknameResponseMsg {
            success: 1,
            nickname: nickname.into(),
            error_code: 0,
        }),
    )
}

pub async fn handle_auth_request(
    engine: &Engine,
    session: &Arc<Session>,
    msg: AuthRequestMsg,
) -> Result<(), SuperchatError> {
    let result = auth::verify_password(&engine.memdb, &msg.nickname, &msg.password_hash.0).await;
    match result {
        Ok(user) => {
            session.set_user_id(user.id).await;
            session.set_nickname(user.nickname.clone()).await;
            session
                .set_is_admin(superchat_common::UserFlags(user.flags as u32).is_admin())
                .await;
            session.set_state(SessionState::Authenticated).await;
            broadcast_presence_snapshot(engine).await;
            reply(
                session,
                &ServerMessage::AuthResponse(AuthResponseMsg {
                    success: 1,
                    user_id: Some(user.id as u64),
                    error_code: 0,
                }),
            )
        }
        Err(err) => {
            reply(
                session,
                &ServerMessage::AuthResponse(AuthResponseMsg {
                    success: 0,
                    user_id: None,
                    error_code: err.code(),
                }),
            )
        }
    }
}

pub async fn handle_register_user(
    engine: &Engine,
    session: &Arc<Session>,
    msg: RegisterUserMsg,
) -> Result<(), SuperchatError> {
    let nickname = msg.nickname.trim();
    if nickname.is_empty() {
        return reply_error(session, &SuperchatError::MissingField("nickname"));
    }
    if msg.password_hash.0.len() != 32 {
        return reply_error(
            session,
            &SuperchatError::InvalidMessage("password_hash must be a 32-byte Argon2id key".to_owned()),
        );
    }
    match auth::register_user(&engine.memdb, nickname, &msg.password_hash.0).await {
        Ok(user) => {
            session.set_user_id(user.id).await;
            session.set_nickname(user.nickname.clone()).await;
            session.set_state(SessionState::Authenticated).await;
            broadcast_presence_snapshot(engine).await;
            reply(
                session,
                &ServerMessage::RegisterResponse(RegisterResponseMsg {
                    success: 1,
                    user_id: Some(user.id as u64),
                    error_code: 0,
                }),
            )
        }
        Err(err) => reply(
            session,
            &ServerMessage::RegisterResponse(RegisterResponseMsg {
                success: 0,
                user_id: None,
                error_code: err.code(),
            }),
        ),
    }
}

pub async fn handle_ping(session: &Arc<Session>, msg: PingMsg) -> Result<(), SuperchatError> {
    reply(
        session,
        &ServerMessage::Pong(PongMsg { client_timestamp: msg.client_timestamp }),
    )
}

pub async fn handle_subscribe_server_presence(
    engine: &Engine,
    session: &Arc<Session>,
) -> Result<(), SuperchatError> {
    engine.subscriptions.subscribe_presence(session.id);
    session.set_presence_subscribed(true).await;
    reply(session, &ServerMessage::SubscribeOk(SubscribeOkMsg { target_id: 0 }))?;
    reply(session, &ServerMessage::ServerPresence(ServerPresenceMsg { users: roster(engine).await }))
}

/// The current server roster (§4.4): every session past `Connected`,
/// rendered the same way message authorship is.
async fn roster(engine: &Engine) -> Vec<ServerPresenceUserMsg> {
    let mut users = Vec::new();
    for other in engine.sessions.iter() {
        if other.state().await == SessionState::Connected {
            continue;
        }
        users.push(ServerPresenceUserMsg {
            nickname: display_nickname(&other).await.into(),
            user_id: other.user_id().await.map(|id| id as u64),
        });
    }
    users
}

/// Pushes a fresh roster snapshot to every server-presence subscriber
/// (§4.4 "server-presence subscribers ... receiving SERVER_PRESENCE
/// (roster) deltas"). Called whenever a session's presence changes —
/// naming, authentication, or disconnect.
async fn broadcast_presence_snapshot(engine: &Engine) {
    let msg = ServerMessage::ServerPresence(ServerPresenceMsg { users: roster(engine).await });
    if let Ok(frame) = super::encode_for(&msg, superchat_codec::PROTOCOL_VERSION) {
        engine.subscriptions.publish_presence(frame, None, &engine.sessions);
    }
}

/// Drops every trace of a session from subscriptions, channel
/// membership, and the session table itself (§4.4 "on session close all
/// memberships are removed"), then tells remaining server-presence
/// subscribers the roster changed. Idempotent: safe to call once from an
/// explicit `DISCONNECT` and again from the transport's
/// connection-teardown path.
pub async fn cleanup_session(engine: &Engine, session: &Arc<Session>) {
    engine.subscriptions.remove_session(session.id);
    for channel_id in session.subscribed_channel_ids().await {
        engine.memdb.remove_participant(channel_id, session.id).await;
    }
    engine.sessions.remove(session.id);
    broadcast_presence_snapshot(engine).await;
}
