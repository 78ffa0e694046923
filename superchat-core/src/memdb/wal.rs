//! Write-ahead log records. Every [`super::MemDb`] mutation emits one
//! of these onto an unbounded channel; [`crate::checkpoint`] drains
//! the channel and folds batches into SQL (§4.5). The WAL is
//! in-process only — there is no on-disk log file, the "log" is the
//! channel buffer between mutation and checkpoint.

use superchat_common::{ChannelId, MessageId, SessionId, UserId};

use super::model::{Channel, ChannelParticipant, DmInvite, Message, User};

#[derive(Debug, Clone)]
pub enum WalRecord {
    UserCreated(User),
    UserPublicKeySet(UserId, [u8; 32]),
    UserFlagsSet(UserId, i32),
    ChannelCreated(Channel),
    ParticipantAdded(ChannelParticipant),
    ParticipantRemoved(ChannelId, SessionId),
    MessagePosted(Message),
    MessageEdited(Message),
    MessageDeleted(MessageId),
    MessagesExpired(Vec<MessageId>),
    DmInviteCreated(DmInvite),
    DmInviteRemoved(i64),
}
