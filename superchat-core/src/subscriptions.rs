//! Fan-out (§4.4): three disjoint interest sets — per-channel,
//! per-thread, and server-wide presence — each mapping to the set of
//! subscribed sessions. Grounded in the teacher's
//! `warpgate-common::eventhub::EventHub` predicate-filtered broadcast,
//! but reworked as concrete maps instead of boxed predicates: the
//! spec's subscription keys (channel id, thread root id) are known
//! enum-like values, not arbitrary filters, so a `DashMap` lookup
//! replaces scanning a predicate list on every send.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use superchat_common::{ChannelId, MessageId, SessionId};
use tracing::warn;

use crate::session::SessionTable;

#[derive(Default)]
pub struct SubscriptionRegistry {
    by_channel: DashMap<ChannelId, HashSet<SessionId>>,
    by_thread: DashMap<MessageId, HashSet<SessionId>>,
    presence: DashMap<SessionId, ()>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_channel(&self, channel_id: ChannelId, session_id: SessionId) {
        self.by_channel.entry(channel_id).or_default().insert(session_id);
    }

    /// Idempotent: unsubscribing a session that was never subscribed is
    /// a no-op, not an error (§4.3 `UnsubscribeChannel`).
    pub fn unsubscribe_channel(&self, channel_id: ChannelId, session_id: SessionId) {
        if let Some(mut set) = self.by_channel.get_mut(&channel_id) {
            set.remove(&session_id);
        }
    }

    pub fn subscribe_thread(&self, thread_root_id: MessageId, session_id: SessionId) {
        self.by_thread.entry(thread_root_id).or_default().insert(session_id);
    }

    pub fn unsubscribe_thread(&self, thread_root_id: MessageId, session_id: SessionId) {
        if let Some(mut set) = self.by_thread.get_mut(&thread_root_id) {
            set.remove(&session_id);
        }
    }

    pub fn subscribe_presence(&self, session_id: SessionId) {
        self.presence.insert(session_id, ());
    }

    pub fn unsubscribe_presence(&self, session_id: SessionId) {
        self.presence.remove(&session_id);
    }

    /// Drops every interest a disconnecting session held, across all
    /// three maps (§4.4 "subscriptions do not outlive the connection").
    pub fn remove_session(&self, session_id: SessionId) {
        for mut set in self.by_channel.iter_mut() {
            set.remove(&session_id);
        }
        for mut set in self.by_thread.iter_mut() {
            set.remove(&session_id);
        }
        self.presence.remove(&session_id);
    }

    /// Encodes `frame` once and delivers the shared buffer to every
    /// session subscribed to `channel_id`, except `exclude` (typically
    /// the author, who already got a direct reply). Sessions whose
    /// outbound queue is full are skipped and counted as drops rather
    /// than blocking the whole fan-out (§4.4).
    pub fn publish_to_channel(
        &self,
        channel_id: ChannelId,
        frame: Bytes,
        exclude: Option<SessionId>,
        sessions: &SessionTable,
    ) {
        let Some(subscribers) = self.by_channel.get(&channel_id) else {
            return;
        };
        let mut dropped = 0u32;
        for session_id in subscribers.iter() {
            if Some(*session_id) == exclude {
                continue;
            }
            if let Some(session) = sessions.get(*session_id) {
                if session.try_send(frame.clone()).is_err() {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            warn!(channel_id, dropped, "dropped frames to slow subscribers");
        }
    }

    pub fn publish_to_thread(
        &self,
        thread_root_id: MessageId,
        frame: Bytes,
        exclude: Option<SessionId>,
        sessions: &SessionTable,
    ) {
        let Some(subscribers) = self.by_thread.get(&thread_root_id) else {
            return;
        };
        for session_id in subscribers.iter() {
            if Some(*session_id) == exclude {
                continue;
            }
            if let Some(session) = sessions.get(*session_id) {
                let _ = session.try_send(frame.clone());
            }
        }
    }

    pub fn publish_presence(&self, frame: Bytes, exclude: Option<SessionId>, sessions: &SessionTable) {
        for entry in self.presence.iter() {
            let session_id = *entry.key();
            if Some(session_id) == exclude {
                continue;
            }
            if let Some(session) = sessions.get(session_id) {
                let _ = session.try_send(frame.clone());
            }
        }
    }

    pub fn channel_subscriber_count(&self, channel_id: ChannelId) -> usize {
        self.by_channel.get(&channel_id).map(|s| s.len()).unwrap_or(0)
    }
}

pub type SharedSubscriptionRegistry = Arc<SubscriptionRegistry>;
