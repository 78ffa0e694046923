//! Plain in-memory row types. These are intentionally not the
//! sea-orm entity `Model`s from `superchat-db-entities` — MemDB is the
//! authoritative store and the SQL schema is a checkpoint of it, not
//! the other way around (§4.5). [`super::checkpoint`] converts between
//! the two.

use chrono::{DateTime, Utc};
use superchat_common::{ChannelId, MessageId, SessionId, UserId};

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    pub password_hash: Option<Vec<u8>>,
    pub flags: i32,
    pub encryption_public_key: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub description: String,
    pub channel_type: u8,
    pub parent_channel_id: Option<ChannelId>,
    pub creator_user_id: Option<UserId>,
    pub retention_hours: u32,
    pub is_dm: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub subchannel_id: Option<ChannelId>,
    pub parent_id: Option<MessageId>,
    pub thread_root_id: Option<MessageId>,
    pub author_user_id: Option<UserId>,
    pub author_nickname: String,
    pub content: Vec<u8>,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub reply_count: i32,
}

#[derive(Debug, Clone)]
pub struct ChannelParticipant {
    pub channel_id: ChannelId,
    pub user_id: Option<UserId>,
    pub session_id: Option<SessionId>,
    pub nickname: String,
    pub is_operator: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DmInvite {
    pub id: i64,
    pub initiator_user_id: Option<UserId>,
    pub initiator_session_id: Option<SessionId>,
    pub target_user_id: Option<UserId>,
    pub target_session_id: Option<SessionId>,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
}
