//! Background checkpointer (§4.5): drains the WAL buffer in batches and
//! applies them to the embedded SQL file every `checkpoint_interval_ms`
//! or whenever the buffer exceeds `checkpoint_batch_threshold`, mirroring
//! the shape of the teacher's `cleanup_db` interval-sweep loop in
//! `warpgate/src/commands/run.rs` (a `tokio::select!` between a ticker
//! and incoming work, run as one dedicated task). Disk is never on the
//! broadcast hot path: [`crate::memdb::MemDb`] only ever pushes onto an
//! unbounded channel, this task is the only thing that ever blocks on
//! I/O against `connection`.
//!
//! Crash recovery is "replay the SQL file": anything still sitting in
//! the channel when the process dies is lost, which is the documented
//! up-to-`checkpoint_interval_ms` loss window (§4.5).

use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::memdb::wal::WalRecord;

/// Drives the checkpointer until the WAL sender side is dropped
/// (graceful shutdown) or `shutdown` fires, flushing one last time on
/// either exit path so a clean shutdown never drops the final batch.
pub async fn run(
    connection: DatabaseConnection,
    mut wal_rx: mpsc::UnboundedReceiver<WalRecord>,
    interval: Duration,
    batch_threshold: usize,
) {
    let mut batch: Vec<WalRecord> = Vec::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = wal_rx.recv() => {
                match received {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= batch_threshold {
                            flush(&connection, &mut batch).await;
                        }
                    }
                    None => {
                        flush(&connection, &mut batch).await;
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&connection, &mut batch).await;
                }
            }
        }
    }
}

async fn flush(connection: &DatabaseConnection, batch: &mut Vec<WalRecord>) {
    if batch.is_empty() {
        return;
    }
    debug!(records = batch.len(), "checkpointing WAL batch");
    for record in batch.drain(..) {
        if let Err(err) = apply(connection, record).await {
            // A checkpoint write failing does not affect any live
            // session — MemDB already holds the authoritative state —
            // so we log and move on rather than abort the loop.
            error!(error = %err, "checkpoint write failed");
        }
    }
}

async fn apply(connection: &DatabaseConnection, record: WalRecord) -> Result<(), sea_orm::DbErr> {
    use superchat_db_entities::{AuditLogEntry, Channel, ChannelParticipant, DmInvite, Message, User};

    match record {
        WalRecord::UserCreated(u) => {
            User::Entity::insert(User::ActiveModel {
                id: Set(u.id),
                nickname: Set(u.nickname),
                password_hash: Set(u.password_hash),
                flags: Set(u.flags),
                encryption_public_key: Set(u.encryption_public_key),
                created_at: Set(u.created_at),
            })
            .exec(connection)
            .await?;
        }
        WalRecord::UserPublicKeySet(user_id, key) => {
            if let Some(model) = User::Entity::find_by_id(user_id).one(connection).await? {
                let mut active: User::ActiveModel = model.into();
                active.encryption_public_key = Set(Some(key.to_vec()));
                active.update(connection).await?;
            }
        }
        WalRecord::UserFlagsSet(user_id, flags) => {
            if let Some(model) = User::Entity::find_by_id(user_id).one(connection).await? {
                let mut active: User::ActiveModel = model.into();
                active.flags = Set(flags);
                active.update(connection).await?;
            }
        }
        WalRecord::ChannelCreated(c) => {
            Channel::Entity::insert(Channel::ActiveModel {
                id: Set(c.id),
                name: Set(c.name),
                description: Set(c.description),
                channel_type: Set(c.channel_type as i16),
                parent_channel_id: Set(c.parent_channel_id),
                creator_user_id: Set(c.creator_user_id),
                retention_hours: Set(c.retention_hours as i32),
                is_dm: Set(c.is_dm),
                is_private: Set(c.is_private),
                created_at: Set(c.created_at),
            })
            .exec(connection)
            .await?;
        }
        WalRecord::ParticipantAdded(p) => {
            ChannelParticipant::Entity::insert(ChannelParticipant::ActiveModel {
                id: NotSet,
                channel_id: Set(p.channel_id),
                user_id: Set(p.user_id),
                session_id: Set(p.session_id.map(|s| s.to_string())),
                nickname: Set(p.nickname),
                is_operator: Set(p.is_operator),
                joined_at: Set(p.joined_at),
            })
            .exec(connection)
            .await?;
        }
        WalRecord::ParticipantRemoved(channel_id, session_id) => {
            ChannelParticipant::Entity::delete_many()
                .filter(ChannelParticipant::Column::ChannelId.eq(channel_id))
                .filter(ChannelParticipant::Column::SessionId.eq(session_id.to_string()))
                .exec(connection)
                .await?;
        }
        WalRecord::MessagePosted(m) => {
            Message::Entity::insert(Message::ActiveModel {
                id: Set(m.id),
                channel_id: Set(m.channel_id),
                subchannel_id: Set(m.subchannel_id),
                parent_message_id: Set(m.parent_id),
                thread_root_id: Set(m.thread_root_id),
                author_user_id: Set(m.author_user_id),
                author_nickname: Set(m.author_nickname),
                content: Set(m.content),
                encrypted: Set(m.encrypted),
                created_at: Set(m.created_at),
                edited_at: Set(m.edited_at),
                deleted_at: Set(m.deleted_at),
                reply_count: Set(m.reply_count),
            })
            .exec(connection)
            .await?;
        }
        WalRecord::MessageEdited(m) => {
            if let Some(model) = Message::Entity::find_by_id(m.id).one(connection).await? {
                let mut active: Message::ActiveModel = model.into();
                active.content = Set(m.content);
                active.edited_at = Set(m.edited_at);
                active.update(connection).await?;
            }
        }
        WalRecord::MessageDeleted(id) => {
            if let Some(model) = Message::Entity::find_by_id(id).one(connection).await? {
                let mut active: Message::ActiveModel = model.into();
                // The exact soft-delete instant lives in MemDB; the
                // checkpoint only needs *a* timestamp no earlier than
                // that one to satisfy "deleted_at is set".
                active.deleted_at = Set(Some(Utc::now()));
                active.update(connection).await?;
            }
        }
        WalRecord::MessagesExpired(ids) => {
            Message::Entity::delete_many()
                .filter(Message::Column::Id.is_in(ids))
                .exec(connection)
                .await?;
        }
        WalRecord::DmInviteCreated(i) => {
            DmInvite::Entity::insert(DmInvite::ActiveModel {
                id: Set(i.id),
                initiator_user_id: Set(i.initiator_user_id),
                initiator_session_id: Set(i.initiator_session_id.map(|s| s.to_string())),
                target_user_id: Set(i.target_user_id),
                target_session_id: Set(i.target_session_id.map(|s| s.to_string())),
                is_encrypted: Set(i.is_encrypted),
                created_at: Set(i.created_at),
            })
            .exec(connection)
            .await?;
        }
        WalRecord::DmInviteRemoved(id) => {
            DmInvite::Entity::delete_by_id(id).exec(connection).await?;
        }
    }
    Ok(())
}

/// Records an administrative or system action (§3 `AuditLogEntry`,
/// grounded in the teacher's `warpgate_db_entities::LogEntry` table).
/// Fire-and-forget: callers do not await durability before replying to
/// a client.
pub async fn record_audit(
    connection: &DatabaseConnection,
    actor_user_id: Option<superchat_common::UserId>,
    action: &str,
    target_description: &str,
) {
    use superchat_db_entities::AuditLogEntry;
    let result = AuditLogEntry::Entity::insert(AuditLogEntry::ActiveModel {
        id: NotSet,
        actor_user_id: Set(actor_user_id),
        action: Set(action.to_owned()),
        target_description: Set(target_description.to_owned()),
        created_at: Set(Utc::now()),
    })
    .exec(connection)
    .await;
    if let Err(err) = result {
        error!(error = %err, action, "failed to record audit log entry");
    }
}

/// Writes the connect-time audit row for a session (§3 `SessionRecord`).
pub async fn record_session_connected(
    connection: &DatabaseConnection,
    session_id: superchat_common::SessionId,
    remote_addr: std::net::IpAddr,
) {
    use superchat_db_entities::SessionRecord;
    let result = SessionRecord::Entity::insert(SessionRecord::ActiveModel {
        id: Set(session_id.to_string()),
        user_id: Set(None),
        nickname: Set(None),
        remote_addr: Set(remote_addr.to_string()),
        connected_at: Set(Utc::now()),
        disconnected_at: Set(None),
    })
    .exec(connection)
    .await;
    if let Err(err) = result {
        error!(error = %err, %session_id, "failed to record session-connected audit row");
    }
}

/// Stamps the disconnect time and final identity onto a session's audit
/// row, if it was recorded on connect.
pub async fn record_session_disconnected(
    connection: &DatabaseConnection,
    session_id: superchat_common::SessionId,
    user_id: Option<superchat_common::UserId>,
    nickname: Option<String>,
) {
    use superchat_db_entities::SessionRecord;
    let Ok(Some(model)) = SessionRecord::Entity::find_by_id(session_id.to_string())
        .one(connection)
        .await
    else {
        return;
    };
    let mut active: SessionRecord::ActiveModel = model.into();
    active.user_id = Set(user_id);
    active.nickname = Set(nickname);
    active.disconnected_at = Set(Some(Utc::now()));
    if let Err(err) = active.update(connection).await {
        error!(error = %err, %session_id, "failed to record session-disconnected audit row");
    }
}
