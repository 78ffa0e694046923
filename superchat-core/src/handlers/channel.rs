//! Channel membership and listing handlers (§4.3): `LIST_CHANNELS`,
//! `CREATE_CHANNEL`, `JOIN_CHANNEL`, `LEAVE_CHANNEL`, plus the
//! broadcast-only subscription family `SUBSCRIBE`/`UNSUBSCRIBE`
//! `CHANNEL`/`THREAD` (§4.4).
//!
//! `JoinChannel` and `SubscribeChannel` are deliberately two different
//! things here: joining records a [`crate::memdb::ChannelParticipant`]
//! row and seeds a burst of recent messages, matching §4.3's
//! description of `JoinChannel`; `SubscribeChannel` only adds broadcast
//! interest in [`crate::subscriptions::SubscriptionRegistry`] with none
//! of that — useful for a client that wants live updates for a channel
//! it already knows about without re-joining. Joining also subscribes,
//! since a join with no broadcast interest would be pointless.

use std::sync::Arc;

use superchat_codec::messages::{
    ChannelCreatedMsg, ChannelListItemMsg, ChannelListMsg, ChannelPresenceMsg, CreateChannelMsg,
    JoinChannelMsg, JoinResponseMsg, LeaveChannelMsg, LeaveResponseMsg, MessageItemMsg,
    ServerMessage, SubscribeChannelMsg, SubscribeOkMsg, SubscribeThreadMsg, UnsubscribeChannelMsg,
    UnsubscribeOkMsg, UnsubscribeThreadMsg,
};
use superchat_common::{ChannelId, ChannelType, SuperchatError};

use super::{encode_for, reply, reply_error, Engine};
use crate::memdb::{Channel, Message};
use crate::session::{Session, SessionState};

const RECENT_MESSAGE_BURST: usize = 50;

fn to_item(c: &Channel) -> ChannelListItemMsg {
    ChannelListItemMsg {
        id: c.id as u64,
        name: c.name.clone().into(),
        description: c.description.clone().into(),
        channel_type: c.channel_type,
        parent_channel_id: c.parent_channel_id.map(|id| id as u64),
    }
}

fn to_message_item(m: &Message) -> MessageItemMsg {
    MessageItemMsg {
        id: m.id as u64,
        channel_id: m.channel_id as u64,
        parent_id: m.parent_id.map(|id| id as u64),
        thread_root_id: m.thread_root_id.map(|id| id as u64),
        author_user_id: m.author_user_id.map(|id| id as u64),
        author_nickname: m.author_nickname.clone().into(),
        content: superchat_codec::primitive::ScBytes(m.content.clone()),
        encrypted: m.encrypted as u8,
        created_at: m.created_at.timestamp(),
        edited_at: m.edited_at.map(|t| t.timestamp()),
        reply_count: m.reply_count as u32,
    }
}

pub async fn handle_list_channels(
    engine: &Engine,
    session: &Arc<Session>,
    msg: superchat_codec::messages::ListChannelsMsg,
) -> Result<(), SuperchatError> {
    let (channels, has_more) = engine.memdb.list_channels(msg.from_id as ChannelId, msg.limit).await;
    reply(
        session,
        &ServerMessage::ChannelList(ChannelListMsg {
            channels: channels.iter().map(to_item).collect(),
            has_more: has_more as u8,
        }),
    )
}

pub async fn handle_create_channel(
    engine: &Engine,
    session: &Arc<Session>,
    msg: CreateChannelMsg,
) -> Result<(), SuperchatError> {
    let state = session.state().await;
    if state != SessionState::Authenticated && !engine.config.policy.allow_anonymous_channel_creation {
        return reply_error(session, &SuperchatError::Unauthenticated);
    }
    if ChannelType::from_u8(msg.channel_type).is_none() {
        return reply_error(
            session,
            &SuperchatError::InvalidMessage("unknown channel_type".to_owned()),
        );
    }
    if !session.rate_limiter.check() {
        return reply_error(session, &SuperchatError::RateLimited);
    }
    let retention_hours = if msg.retention_hours == 0 {
        engine.config.limits.default_retention_hours
    } else {
        msg.retention_hours
    };
    let result = engine
        .memdb
        .create_channel(
            msg.name.trim(),
            msg.description.trim(),
            msg.channel_type,
            retention_hours,
            msg.parent_channel_id.map(|id| id as ChannelId),
            session.user_id().await,
            false,
            false,
        )
        .await;
    match result {
        Ok(channel) => reply(
            session,
            &ServerMessage::ChannelCreated(ChannelCreatedMsg { channel_id: channel.id as u64 }),
        ),
        Err(err) => reply_error(session, &err),
    }
}

pub async fn handle_join_channel(
    engine: &Engine,
    session: &Arc<Session>,
    msg: JoinChannelMsg,
) -> Result<(), SuperchatError> {
    let channel_id = msg.channel_id as ChannelId;
    let Some(channel) = engine.memdb.get_channel(channel_id).await else {
        return reply_error(session, &SuperchatError::ChannelNotFound(channel_id));
    };
    if channel.is_dm {
        return reply_error(session, &SuperchatError::Forbidden);
    }
    if session.channel_subscription_count().await >= engine.config.limits.max_channel_subscriptions as usize
    {
        return reply_error(session, &SuperchatError::SubscriptionLimit);
    }

    let nickname = super::presence::display_nickname(session).await;
    let add = engine
        .memdb
        .add_participant(channel_id, session.user_id().await, Some(session.id), &nickname, false)
        .await;
    if let Err(err) = add {
        return reply_error(session, &err);
    }

    session.subscribe_channel(channel_id).await;
    engine.subscriptions.subscribe_channel(channel_id, session.id);

    let recent = engine.memdb.recent_messages(channel_id, RECENT_MESSAGE_BURST).await;
    reply(
        session,
        &ServerMessage::JoinResponse(JoinResponseMsg {
            success: 1,
            channel_id: msg.channel_id,
            error_code: 0,
            recent_messages: recent.iter().map(to_message_item).collect(),
        }),
    )?;

    broadcast_channel_presence(engine, channel_id).await;
    Ok(())
}

pub async fn handle_leave_channel(
    engine: &Engine,
    session: &Arc<Session>,
    msg: LeaveChannelMsg,
) -> Result<(), SuperchatError> {
    let channel_id = msg.channel_id as ChannelId;
    engine.memdb.remove_participant(channel_id, session.id).await;
    session.unsubscribe_channel(channel_id).await;
    engine.subscriptions.unsubscribe_channel(channel_id, session.id);
    reply(
        session,
        &ServerMessage::LeaveResponse(LeaveResponseMsg { success: 1, channel_id: msg.channel_id }),
    )?;
    broadcast_channel_presence(engine, channel_id).await;
    Ok(())
}

pub async fn handle_subscribe_channel(
    engine: &Engine,
    session: &Arc<Session>,
    msg: SubscribeChannelMsg,
) -> Result<(), SuperchatError> {
    let channel_id = msg.channel_id as ChannelId;
    if engine.memdb.get_channel(channel_id).await.is_none() {
        return reply_error(session, &SuperchatError::ChannelNotFound(channel_id));
    }
    if session.channel_subscription_count().await >= engine.config.limits.max_channel_subscriptions as usize
    {
        return reply_error(session, &SuperchatError::SubscriptionLimit);
    }
    session.subscribe_channel(channel_id).await;
    engine.subscriptions.subscribe_channel(channel_id, session.id);
    reply(session, &ServerMessage::SubscribeOk(SubscribeOkMsg { target_id: msg.channel_id }))
}

pub async fn handle_unsubscribe_channel(
    engine: &Engine,
    session: &Arc<Session>,
    msg: UnsubscribeChannelMsg,
) -> Result<(), SuperchatError> {
    let channel_id = msg.channel_id as ChannelId;
    session.unsubscribe_channel(channel_id).await;
    engine.subscriptions.unsubscribe_channel(channel_id, session.id);
    reply(session, &ServerMessage::UnsubscribeOk(UnsubscribeOkMsg { target_id: msg.channel_id }))
}

pub async fn handle_subscribe_thread(
    engine: &Engine,
    session: &Arc<Session>,
    msg: SubscribeThreadMsg,
) -> Result<(), SuperchatError> {
    let thread_root_id = msg.thread_root_id as i64;
    if engine.memdb.get_message(thread_root_id).await.is_none() {
        return reply_error(session, &SuperchatError::MessageNotFound(thread_root_id));
    }
    if session.thread_subscription_count().await >= engine.config.limits.max_thread_subscriptions as usize
    {
        return reply_error(session, &SuperchatError::SubscriptionLimit);
    }
    session.subscribe_thread(thread_root_id).await;
    engine.subscriptions.subscribe_thread(thread_root_id, session.id);
    reply(session, &ServerMessage::SubscribeOk(SubscribeOkMsg { target_id: msg.thread_root_id }))
}

pub async fn handle_unsubscribe_thread(
    engine: &Engine,
    session: &Arc<Session>,
    msg: UnsubscribeThreadMsg,
) -> Result<(), SuperchatError> {
    let thread_root_id = msg.thread_root_id as i64;
    session.unsubscribe_thread(thread_root_id).await;
    engine.subscriptions.unsubscribe_thread(thread_root_id, session.id);
    reply(session, &ServerMessage::UnsubscribeOk(UnsubscribeOkMsg { target_id: msg.thread_root_id }))
}

/// Encodes one `CHANNEL_PRESENCE` frame and fans it out to everyone
/// subscribed to `channel_id` (§4.4: "for NEW_MESSAGE and
/// CHANNEL_PRESENCE broadcasts").
pub(super) async fn broadcast_channel_presence(engine: &Engine, channel_id: ChannelId) {
    let user_count = engine.memdb.channel_participants(channel_id).await.len() as u32;
    let msg = ServerMessage::ChannelPresence(ChannelPresenceMsg { channel_id: channel_id as u64, user_count });
    // Peer version only matters for compression; presence frames are tiny
    // so version 2 is a safe default for every fan-out recipient.
    if let Ok(frame) = encode_for(&msg, superchat_codec::PROTOCOL_VERSION) {
        engine.subscriptions.publish_to_channel(channel_id, frame, None, &engine.sessions);
    }
}
