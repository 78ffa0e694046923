//! The authoritative in-memory database (§4.5). A single
//! `tokio::sync::RwLock` guards the maps: writers take the write half
//! (serializing mutations, matching "writes go through a single writer
//! stream"), readers take the read half concurrently. Every mutation
//! also appends a [`wal::WalRecord`] to the WAL buffer — the
//! broadcast/reply path never waits on that append, only on the lock.
//!
//! MemDB never returns an error for a broken invariant (§7: "the MemDB
//! never raises; all invariant violations panic the process"). The
//! `Result` it does return is for *expected* outcomes named in §4.3's
//! operation list (name in use, not found, forbidden, …).

mod model;
pub mod wal;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
pub use model::{Channel, ChannelParticipant, DmInvite, Message, User};
use superchat_common::{ChannelId, MessageId, SessionId, SuperchatError, UserId};
use tokio::sync::{mpsc, RwLock};

use self::wal::WalRecord;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    users_by_nickname_lower: HashMap<String, UserId>,
    channels: HashMap<ChannelId, Channel>,
    messages: HashMap<MessageId, Message>,
    /// channel_id -> root message ids, ordered by id, for `ListMessages`.
    channel_roots: HashMap<ChannelId, Vec<MessageId>>,
    /// parent message id -> reply ids, ordered by id.
    replies: HashMap<MessageId, Vec<MessageId>>,
    participants: HashMap<ChannelId, Vec<ChannelParticipant>>,
    dm_invites: HashMap<i64, DmInvite>,
}

/// The in-memory authoritative store. Cloning is cheap (`Arc` inside);
/// every clone shares the same lock and id counters.
#[derive(Clone)]
pub struct MemDb {
    tables: Arc<RwLock<Tables>>,
    next_user_id: Arc<AtomicI64>,
    next_channel_id: Arc<AtomicI64>,
    next_message_id: Arc<AtomicI64>,
    next_invite_id: Arc<AtomicI64>,
    wal_tx: mpsc::UnboundedSender<WalRecord>,
}

impl MemDb {
    /// `wal_tx` feeds the checkpointer (`superchat_core::checkpoint`);
    /// the caller owns the matching receiver.
    pub fn new(wal_tx: mpsc::UnboundedSender<WalRecord>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            next_user_id: Arc::new(AtomicI64::new(1)),
            next_channel_id: Arc::new(AtomicI64::new(1)),
            next_message_id: Arc::new(AtomicI64::new(1)),
            next_invite_id: Arc::new(AtomicI64::new(1)),
            wal_tx,
        }
    }

    fn append_wal(&self, record: WalRecord) {
        // An unbounded send only fails if the checkpointer task has
        // been dropped, which only happens at shutdown; nothing useful
        // to do with the error at that point.
        let _ = self.wal_tx.send(record);
    }

    // ---- Users ----------------------------------------------------

    pub async fn create_user(
        &self,
        nickname: &str,
        password_hash: Option<Vec<u8>>,
        flags: i32,
    ) -> Result<User, SuperchatError> {
        let mut tables = self.tables.write().await;
        let lower = nickname.to_lowercase();
        if tables.users_by_nickname_lower.contains_key(&lower) {
            return Err(SuperchatError::NameInUse(nickname.to_owned()));
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            nickname: nickname.to_owned(),
            password_hash,
            flags,
            encryption_public_key: None,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        tables.users_by_nickname_lower.insert(lower, id);
        drop(tables);
        self.append_wal(WalRecord::UserCreated(user.clone()));
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Option<User> {
        self.tables.read().await.users.get(&id).cloned()
    }

    pub async fn get_user_by_nickname(&self, nickname: &str) -> Option<User> {
        let tables = self.tables.read().await;
        let id = tables.users_by_nickname_lower.get(&nickname.to_lowercase())?;
        tables.users.get(id).cloned()
    }

    pub async fn set_user_public_key(
        &self,
        user_id: UserId,
        key: [u8; 32],
    ) -> Result<(), SuperchatError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(SuperchatError::UserNotFound(user_id.to_string()))?;
        user.encryption_public_key = Some(key.to_vec());
        drop(tables);
        self.append_wal(WalRecord::UserPublicKeySet(user_id, key));
        Ok(())
    }

    pub async fn set_user_banned(&self, user_id: UserId, banned: bool) -> Result<(), SuperchatError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(SuperchatError::UserNotFound(user_id.to_string()))?;
        if banned {
            user.flags |= superchat_common::UserFlags::BANNED as i32;
        } else {
            user.flags &= !(superchat_common::UserFlags::BANNED as i32);
        }
        let flags = user.flags;
        drop(tables);
        self.append_wal(WalRecord::UserFlagsSet(user_id, flags));
        Ok(())
    }

    // ---- Channels ---------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_channel(
        &self,
        name: &str,
        description: &str,
        channel_type: u8,
        retention_hours: u32,
        parent_channel_id: Option<ChannelId>,
        creator_user_id: Option<UserId>,
        is_dm: bool,
        is_private: bool,
    ) -> Result<Channel, SuperchatError> {
        let mut tables = self.tables.write().await;
        if !is_dm {
            let name_taken = tables.channels.values().any(|c| {
                !c.is_dm && c.parent_channel_id == parent_channel_id && c.name == name
            });
            if name_taken {
                return Err(SuperchatError::NameInUse(name.to_owned()));
            }
        }
        let id = self.next_channel_id.fetch_add(1, Ordering::SeqCst);
        let channel = Channel {
            id,
            name: name.to_owned(),
            description: description.to_owned(),
            channel_type,
            parent_channel_id,
            creator_user_id,
            retention_hours,
            is_dm,
            is_private,
            created_at: Utc::now(),
        };
        tables.channels.insert(id, channel.clone());
        tables.channel_roots.insert(id, Vec::new());
        tables.participants.insert(id, Vec::new());
        drop(tables);
        self.append_wal(WalRecord::ChannelCreated(channel.clone()));
        Ok(channel)
    }

    pub async fn get_channel(&self, id: ChannelId) -> Option<Channel> {
        self.tables.read().await.channels.get(&id).cloned()
    }

    /// Ordered by id, excluding DMs (§4.3 `ListChannels`).
    pub async fn list_channels(&self, from_id: ChannelId, limit: u16) -> (Vec<Channel>, bool) {
        let tables = self.tables.read().await;
        let mut ids: Vec<_> = tables
            .channels
            .values()
            .filter(|c| !c.is_dm && c.id >= from_id)
            .cloned()
            .collect();
        ids.sort_by_key(|c| c.id);
        let has_more = ids.len() > limit as usize;
        ids.truncate(limit as usize);
        (ids, has_more)
    }

    pub async fn add_participant(
        &self,
        channel_id: ChannelId,
        user_id: Option<UserId>,
        session_id: Option<SessionId>,
        nickname: &str,
        is_operator: bool,
    ) -> Result<ChannelParticipant, SuperchatError> {
        if user_id.is_none() && session_id.is_none() {
            return Err(SuperchatError::Internal(anyhow::anyhow!(
                "channel participant must have a user or session"
            )));
        }
        let mut tables = self.tables.write().await;
        if !tables.channels.contains_key(&channel_id) {
            return Err(SuperchatError::ChannelNotFound(channel_id));
        }
        let participant = ChannelParticipant {
            channel_id,
            user_id,
            session_id,
            nickname: nickname.to_owned(),
            is_operator,
            joined_at: Utc::now(),
        };
        tables
            .participants
            .entry(channel_id)
            .or_default()
            .push(participant.clone());
        drop(tables);
        self.append_wal(WalRecord::ParticipantAdded(participant.clone()));
        Ok(participant)
    }

    pub async fn remove_participant(&self, channel_id: ChannelId, session_id: SessionId) {
        let mut tables = self.tables.write().await;
        if let Some(list) = tables.participants.get_mut(&channel_id) {
            list.retain(|p| p.session_id != Some(session_id));
        }
        drop(tables);
        self.append_wal(WalRecord::ParticipantRemoved(channel_id, session_id));
    }

    pub async fn channel_participants(&self, channel_id: ChannelId) -> Vec<ChannelParticipant> {
        self.tables
            .read()
            .await
            .participants
            .get(&channel_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn find_dm_channel(&self, a: UserId, b: UserId) -> Option<Channel> {
        let tables = self.tables.read().await;
        for (channel_id, participants) in tables.participants.iter() {
            if !tables.channels.get(channel_id).is_some_and(|c| c.is_dm) {
                continue;
            }
            let has_a = participants.iter().any(|p| p.user_id == Some(a));
            let has_b = participants.iter().any(|p| p.user_id == Some(b));
            if has_a && has_b {
                return tables.channels.get(channel_id).cloned();
            }
        }
        None
    }

    // ---- Messages -----------------------------------------------------

    /// Validates, assigns a monotonic id, denormalizes `reply_count` on
    /// the parent and thread root, and returns the stored message
    /// (§4.3 `PostMessage`).
    #[allow(clippy::too_many_arguments)]
    pub async fn post_message(
        &self,
        channel_id: ChannelId,
        subchannel_id: Option<ChannelId>,
        parent_id: Option<MessageId>,
        author_user_id: Option<UserId>,
        author_nickname: &str,
        content: Vec<u8>,
        encrypted: bool,
    ) -> Result<Message, SuperchatError> {
        let mut tables = self.tables.write().await;
        if !tables.channels.contains_key(&channel_id) {
            return Err(SuperchatError::ChannelNotFound(channel_id));
        }
        let thread_root_id = match parent_id {
            None => None,
            Some(parent_id) => {
                let parent = tables
                    .messages
                    .get(&parent_id)
                    .ok_or(SuperchatError::MessageNotFound(parent_id))?;
                if parent.channel_id != channel_id {
                    return Err(SuperchatError::InvalidMessage(
                        "parent message is in a different channel".to_owned(),
                    ));
                }
                Some(parent.thread_root_id.unwrap_or(parent_id))
            }
        };

        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id,
            channel_id,
            subchannel_id,
            parent_id,
            thread_root_id,
            author_user_id,
            author_nickname: author_nickname.to_owned(),
            content,
            encrypted,
            created_at: Utc::now(),
            edited_at: None,
            deleted_at: None,
            reply_count: 0,
        };
        tables.messages.insert(id, message.clone());

        match parent_id {
            None => tables.channel_roots.entry(channel_id).or_default().push(id),
            Some(parent_id) => {
                tables.replies.entry(parent_id).or_default().push(id);
                if let Some(parent) = tables.messages.get_mut(&parent_id) {
                    parent.reply_count += 1;
                }
                if let Some(root_id) = thread_root_id {
                    if root_id != parent_id {
                        if let Some(root) = tables.messages.get_mut(&root_id) {
                            root.reply_count += 1;
                        }
                    }
                }
            }
        }
        drop(tables);
        self.append_wal(WalRecord::MessagePosted(message.clone()));
        Ok(message)
    }

    pub async fn get_message(&self, id: MessageId) -> Option<Message> {
        self.tables.read().await.messages.get(&id).cloned()
    }

    pub async fn edit_message(
        &self,
        id: MessageId,
        editor_user_id: Option<UserId>,
        is_admin: bool,
        new_content: Vec<u8>,
    ) -> Result<Message, SuperchatError> {
        let mut tables = self.tables.write().await;
        let message = tables
            .messages
            .get_mut(&id)
            .ok_or(SuperchatError::MessageNotFound(id))?;
        if message.deleted_at.is_some() {
            return Err(SuperchatError::MessageNotFound(id));
        }
        if !is_admin && message.author_user_id != editor_user_id {
            return Err(SuperchatError::Forbidden);
        }
        message.content = new_content;
        message.edited_at = Some(Utc::now());
        let updated = message.clone();
        drop(tables);
        self.append_wal(WalRecord::MessageEdited(updated.clone()));
        Ok(updated)
    }

    pub async fn delete_message(
        &self,
        id: MessageId,
        deleter_user_id: Option<UserId>,
        is_admin: bool,
    ) -> Result<Message, SuperchatError> {
        let mut tables = self.tables.write().await;
        let message = tables
            .messages
            .get(&id)
            .ok_or(SuperchatError::MessageNotFound(id))?
            .clone();
        if message.deleted_at.is_some() {
            return Err(SuperchatError::MessageNotFound(id));
        }
        if !is_admin && message.author_user_id != deleter_user_id {
            return Err(SuperchatError::Forbidden);
        }
        let parent_id = message.parent_id;
        let thread_root_id = message.thread_root_id;
        if let Some(m) = tables.messages.get_mut(&id) {
            m.deleted_at = Some(Utc::now());
        }
        if let Some(parent_id) = parent_id {
            if let Some(parent) = tables.messages.get_mut(&parent_id) {
                parent.reply_count = parent.reply_count.saturating_sub(1);
            }
            if let Some(root_id) = thread_root_id {
                if root_id != parent_id {
                    if let Some(root) = tables.messages.get_mut(&root_id) {
                        root.reply_count = root.reply_count.saturating_sub(1);
                    }
                }
            }
        }
        let deleted = tables.messages.get(&id).cloned().expect("just updated");
        drop(tables);
        self.append_wal(WalRecord::MessageDeleted(id));
        Ok(deleted)
    }

    /// `parent=None` returns thread roots; `parent=Some(x)` returns only
    /// replies to `x` (§4.3 `ListMessages`). Ordered by id descending
    /// with a `before_id` cursor.
    pub async fn list_messages(
        &self,
        channel_id: ChannelId,
        parent_id: Option<MessageId>,
        limit: u16,
        before_id: Option<MessageId>,
        after_id: Option<MessageId>,
    ) -> (Vec<Message>, bool) {
        let tables = self.tables.read().await;
        let candidate_ids: Vec<MessageId> = match parent_id {
            None => tables
                .channel_roots
                .get(&channel_id)
                .cloned()
                .unwrap_or_default(),
            Some(parent_id) => tables.replies.get(&parent_id).cloned().unwrap_or_default(),
        };
        let mut messages: Vec<Message> = candidate_ids
            .into_iter()
            .filter_map(|id| tables.messages.get(&id).cloned())
            .filter(|m| m.deleted_at.is_none())
            .filter(|m| before_id.is_none_or(|b| m.id < b))
            .filter(|m| after_id.is_none_or(|a| m.id > a))
            .collect();
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        let has_more = messages.len() > limit as usize;
        messages.truncate(limit as usize);
        (messages, has_more)
    }

    /// Most recent `n` root messages in a channel, newest last — used
    /// to seed `JoinResponse`'s burst of recent messages (§4.3).
    pub async fn recent_messages(&self, channel_id: ChannelId, n: usize) -> Vec<Message> {
        let (mut messages, _) = self.list_messages(channel_id, None, n as u16, None, None).await;
        messages.reverse();
        messages
    }

    // ---- DM invites -----------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_dm_invite(
        &self,
        initiator_user_id: Option<UserId>,
        initiator_session_id: Option<SessionId>,
        target_user_id: Option<UserId>,
        target_session_id: Option<SessionId>,
        is_encrypted: bool,
    ) -> DmInvite {
        let mut tables = self.tables.write().await;
        let id = self.next_invite_id.fetch_add(1, Ordering::SeqCst);
        let invite = DmInvite {
            id,
            initiator_user_id,
            initiator_session_id,
            target_user_id,
            target_session_id,
            is_encrypted,
            created_at: Utc::now(),
        };
        tables.dm_invites.insert(id, invite.clone());
        drop(tables);
        self.append_wal(WalRecord::DmInviteCreated(invite.clone()));
        invite
    }

    pub async fn take_dm_invite(&self, id: i64) -> Option<DmInvite> {
        let mut tables = self.tables.write().await;
        let invite = tables.dm_invites.remove(&id);
        drop(tables);
        if invite.is_some() {
            self.append_wal(WalRecord::DmInviteRemoved(id));
        }
        invite
    }

    pub async fn find_dm_invite_for_session(&self, session_id: SessionId) -> Option<DmInvite> {
        let tables = self.tables.read().await;
        tables
            .dm_invites
            .values()
            .find(|i| {
                i.initiator_session_id == Some(session_id) || i.target_session_id == Some(session_id)
            })
            .cloned()
    }

    // ---- Retention sweeper (§4.3) -----------------------------------

    /// Hard-deletes messages older than their channel's
    /// `retention_hours`. Returns the count removed, for logging.
    pub async fn sweep_retention(&self) -> usize {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let cutoffs: HashMap<ChannelId, chrono::DateTime<Utc>> = tables
            .channels
            .values()
            .filter(|c| c.retention_hours > 0)
            .map(|c| (c.id, now - chrono::Duration::hours(c.retention_hours as i64)))
            .collect();
        let expired: Vec<MessageId> = tables
            .messages
            .values()
            .filter(|m| {
                cutoffs
                    .get(&m.channel_id)
                    .is_some_and(|cutoff| m.created_at < *cutoff)
            })
            .map(|m| m.id)
            .collect();
        for id in &expired {
            tables.messages.remove(id);
        }
        for ids in tables.channel_roots.values_mut() {
            ids.retain(|id| !expired.contains(id));
        }
        for ids in tables.replies.values_mut() {
            ids.retain(|id| !expired.contains(id));
        }
        let count = expired.len();
        drop(tables);
        if count > 0 {
            self.append_wal(WalRecord::MessagesExpired(expired));
        }
        count
    }
}
