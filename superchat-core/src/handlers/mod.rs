//! Message dispatch (§4.3): validate → mutate MemDB → fan out. One
//! function per message family, all going through [`dispatch`] so no
//! transport ever touches [`MemDb`] or [`SubscriptionRegistry`]
//! directly — mirrors the teacher's `server::session` funnelling every
//! SSH channel event through one handler before it reaches a target.

mod channel;
mod dm;
mod message;
mod presence;

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use superchat_codec::messages::{ClientMessage, ErrorMsg, ServerMessage};
use superchat_codec::Frame;
use superchat_common::config::Config;
use superchat_common::{ChannelId, SuperchatError};
use tracing::warn;

use crate::memdb::MemDb;
use crate::session::{Session, SessionState};
use crate::subscriptions::SubscriptionRegistry;
use crate::SessionTable;

use self::dm::PendingDm;

/// Everything a handler needs, bundled so `dispatch` takes one extra
/// argument per call site instead of four.
#[derive(Clone)]
pub struct Engine {
    pub memdb: MemDb,
    pub sessions: SessionTable,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub config: Arc<Config>,
    /// DM channels created by [`dm::handle_start_dm`] that are waiting on
    /// a peer's encryption key (§4.6 steps 2-3). Keyed by the
    /// already-materialized channel id — see [`dm`]'s module doc for why
    /// the encrypted-handshake path creates the channel up front instead
    /// of waiting for both keys like the unencrypted-consent path does.
    pending_dms: Arc<DashMap<ChannelId, PendingDm>>,
}

impl Engine {
    pub fn new(
        memdb: MemDb,
        sessions: SessionTable,
        subscriptions: Arc<SubscriptionRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            memdb,
            sessions,
            subscriptions,
            config,
            pending_dms: Arc::new(DashMap::new()),
        }
    }
}

/// Encodes `msg` as a frame addressed to `session`'s negotiated
/// protocol version and tries to enqueue it. Used for direct
/// request/response replies (fan-out goes through
/// [`SubscriptionRegistry`] instead).
pub fn reply(session: &Session, msg: &ServerMessage) -> Result<(), SuperchatError> {
    let frame = Frame::new(msg.message_type() as u8, msg.encode_payload());
    let wire = frame
        .encode(session.peer_protocol_version)
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("encode: {e}")))?;
    if session.try_send(wire).is_err() {
        warn!(session_id = %session.id, "outbound queue full, dropping reply");
    }
    Ok(())
}

pub fn encode_for(msg: &ServerMessage, peer_version: u8) -> Result<Bytes, SuperchatError> {
    let frame = Frame::new(msg.message_type() as u8, msg.encode_payload());
    frame
        .encode(peer_version)
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("encode: {e}")))
}

pub fn error_msg(err: &SuperchatError) -> ServerMessage {
    ServerMessage::Error(ErrorMsg {
        code: err.code(),
        message: err.wire_message().into(),
    })
}

/// Replies with an `ERROR` frame carrying `err`'s wire code and message.
pub fn reply_error(session: &Session, err: &SuperchatError) -> Result<(), SuperchatError> {
    reply(session, &error_msg(err))
}

pub use channel::*;
pub use dm::*;
pub use message::*;
pub use presence::*;

/// Routes one decoded client message to its handler (§4.3). The single
/// entry point every transport drives its read loop through; see the
/// module doc comment for why transports never reach into [`MemDb`] or
/// [`SubscriptionRegistry`] on their own.
pub async fn dispatch(
    engine: &Engine,
    session: &Arc<Session>,
    msg: ClientMessage,
) -> Result<(), SuperchatError> {
    match msg {
        ClientMessage::SetNickname(m) => presence::handle_set_nickname(engine, session, m).await,
        ClientMessage::AuthRequest(m) => presence::handle_auth_request(engine, session, m).await,
        ClientMessage::RegisterUser(m) => presence::handle_register_user(engine, session, m).await,
        ClientMessage::Ping(m) => presence::handle_ping(session, m).await,
        ClientMessage::SubscribeServerPresence => {
            presence::handle_subscribe_server_presence(engine, session).await
        }
        ClientMessage::Disconnect => {
            session.set_state(SessionState::Closing).await;
            presence::cleanup_session(engine, session).await;
            Ok(())
        }
        ClientMessage::ListChannels(m) => channel::handle_list_channels(engine, session, m).await,
        ClientMessage::CreateChannel(m) => channel::handle_create_channel(engine, session, m).await,
        ClientMessage::JoinChannel(m) => channel::handle_join_channel(engine, session, m).await,
        ClientMessage::LeaveChannel(m) => channel::handle_leave_channel(engine, session, m).await,
        ClientMessage::SubscribeChannel(m) => channel::handle_subscribe_channel(engine, session, m).await,
        ClientMessage::UnsubscribeChannel(m) => {
            channel::handle_unsubscribe_channel(engine, session, m).await
        }
        ClientMessage::SubscribeThread(m) => channel::handle_subscribe_thread(engine, session, m).await,
        ClientMessage::UnsubscribeThread(m) => {
            channel::handle_unsubscribe_thread(engine, session, m).await
        }
        ClientMessage::ListMessages(m) => message::handle_list_messages(engine, session, m).await,
        ClientMessage::PostMessage(m) => message::handle_post_message(engine, session, m).await,
        ClientMessage::EditMessage(m) => message::handle_edit_message(engine, session, m).await,
        ClientMessage::DeleteMessage(m) => message::handle_delete_message(engine, session, m).await,
        ClientMessage::StartDm(m) => dm::handle_start_dm(engine, session, m).await,
        ClientMessage::ProvidePublicKey(m) => dm::handle_provide_public_key(engine, session, m).await,
        ClientMessage::UploadPublicKey(m) => dm::handle_upload_public_key(engine, session, m).await,
        ClientMessage::AllowUnencrypted(m) => dm::handle_allow_unencrypted(engine, session, m).await,
        ClientMessage::AcceptUnencrypted(m) => dm::handle_accept_unencrypted(engine, session, m).await,
        ClientMessage::DeclineDm(m) => dm::handle_decline_dm(engine, session, m).await,
    }
}
