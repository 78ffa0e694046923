//! Post/edit/delete/list handlers (§4.3). Every mutation here goes
//! through [`crate::memdb::MemDb`] first (which assigns the id,
//! denormalizes `reply_count`, and appends the WAL record) and only
//! then reaches the subscription fan-out, matching §4.3's ordering
//! guarantee: "the write to the session happens in the handler before
//! fan-out."

use std::sync::Arc;

use superchat_codec::messages::{
    DeleteMessageMsg, EditMessageMsg, ListMessagesMsg, MessageDeletedMsg, MessageEditedMsg,
    MessageListMsg, MessagePostedMsg, NewMessageMsg, PostMessageMsg, ServerMessage,
};
use superchat_common::{MessageId, SuperchatError};

use super::{encode_for, reply, reply_error, Engine};
use crate::session::{Session, SessionState};

fn to_message_item(m: &crate::memdb::Message) -> superchat_codec::messages::MessageItemMsg {
    superchat_codec::messages::MessageItemMsg {
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

pub async fn handle_list_messages(
    engine: &Engine,
    session: &Arc<Session>,
    msg: ListMessagesMsg,
) -> Result<(), SuperchatError> {
    let (messages, has_more) = engine
        .memdb
        .list_messages(
            msg.channel_id as i64,
            msg.parent_id.map(|id| id as MessageId),
            msg.limit,
            msg.before_id.map(|id| id as MessageId),
            msg.after_id.map(|id| id as MessageId),
        )
        .await;
    reply(
        session,
        &ServerMessage::MessageList(MessageListMsg {
            messages: messages.iter().map(to_message_item).collect(),
            has_more: has_more as u8,
        }),
    )
}

pub async fn handle_post_message(
    engine: &Engine,
    session: &Arc<Session>,
    msg: PostMessageMsg,
) -> Result<(), SuperchatError> {
    if session.state().await == SessionState::Connected {
        return reply_error(session, &SuperchatError::Unauthenticated);
    }
    if !session.rate_limiter.check() {
        return reply_error(session, &SuperchatError::RateLimited);
    }
    if msg.content.0.len() > engine.config.limits.max_message_bytes as usize {
        return reply_error(session, &SuperchatError::TooLong("content"));
    }

    let nickname = super::presence::display_nickname(session).await;
    let result = engine
        .memdb
        .post_message(
            msg.channel_id as i64,
            msg.subchannel_id.map(|id| id as i64),
            msg.parent_id.map(|id| id as MessageId),
            session.user_id().await,
            &nickname,
            msg.content.0.clone(),
            msg.encrypted != 0,
        )
        .await;

    let message = match result {
        Ok(m) => m,
        Err(err) => {
            reply(
                session,
                &ServerMessage::MessagePosted(MessagePostedMsg {
                    success: 0,
                    message_id: 0,
                    error_code: err.code(),
                }),
            )?;
            return Ok(());
        }
    };

    reply(
        session,
        &ServerMessage::MessagePosted(MessagePostedMsg {
            success: 1,
            message_id: message.id as u64,
            error_code: 0,
        }),
    )?;

    let broadcast = ServerMessage::NewMessage(NewMessageMsg { message: to_message_item(&message) });
    if let Ok(frame) = encode_for(&broadcast, superchat_codec::PROTOCOL_VERSION) {
        engine.subscriptions.publish_to_channel(message.channel_id, frame.clone(), None, &engine.sessions);
        if let Some(thread_root_id) = message.thread_root_id {
            engine.subscriptions.publish_to_thread(thread_root_id, frame, None, &engine.sessions);
        }
    }
    Ok(())
}

pub async fn handle_edit_message(
    engine: &Engine,
    session: &Arc<Session>,
    msg: EditMessageMsg,
) -> Result<(), SuperchatError> {
    if msg.new_content.0.len() > engine.config.limits.max_message_bytes as usize {
        return reply_error(session, &SuperchatError::TooLong("new_content"));
    }
    let result = engine
        .memdb
        .edit_message(msg.message_id as MessageId, session.user_id().await, session.is_admin().await, msg.new_content.0.clone())
        .await;
    let message = match result {
        Ok(m) => m,
        Err(err) => return reply_error(session, &err),
    };
    let edited_at = message.edited_at.expect("just edited").timestamp();
    let response = ServerMessage::MessageEdited(MessageEditedMsg { message_id: msg.message_id, edited_at });
    reply(session, &response)?;
    if let Ok(frame) = encode_for(&response, superchat_codec::PROTOCOL_VERSION) {
        engine.subscriptions.publish_to_channel(message.channel_id, frame.clone(), Some(session.id), &engine.sessions);
        if let Some(thread_root_id) = message.thread_root_id {
            engine.subscriptions.publish_to_thread(thread_root_id, frame, Some(session.id), &engine.sessions);
        }
    }
    Ok(())
}

pub async fn handle_delete_message(
    engine: &Engine,
    session: &Arc<Session>,
    msg: DeleteMessageMsg,
) -> Result<(), SuperchatError> {
    let result = engine
        .memdb
        .delete_message(msg.message_id as MessageId, session.user_id().await, session.is_admin().await)
        .await;
    let message = match result {
        Ok(m) => m,
        Err(err) => return reply_error(session, &err),
    };
    let response = ServerMessage::MessageDeleted(MessageDeletedMsg { message_id: msg.message_id });
    reply(session, &response)?;
    if let Ok(frame) = encode_for(&response, superchat_codec::PROTOCOL_VERSION) {
        engine.subscriptions.publish_to_channel(message.channel_id, frame.clone(), Some(session.id), &engine.sessions);
        if let Some(thread_root_id) = message.thread_root_id {
            engine.subscriptions.publish_to_thread(thread_root_id, frame, Some(session.id), &engine.sessions);
        }
    }
    Ok(())
}
