//! Per-connection state (§4.2, §4.4), transport-agnostic. The TCP/WS/SSH
//! listeners each own a [`Session`] for the lifetime of a connection and
//! drive it through [`crate::handlers::dispatch`]; none of them touch
//! [`crate::MemDb`] or [`crate::SubscriptionRegistry`] directly.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use superchat_common::{ChannelId, MessageId, SessionId, UserId};
use tokio::sync::{mpsc, Mutex};

use crate::rate_limit::SessionRateLimiter;

/// Connection lifecycle (§4.2): a session starts `Connected`, becomes
/// `Named` on `SET_NICKNAME`, optionally `Authenticated` on a
/// successful `AUTH_REQUEST`/`REGISTER_USER`, and `Closing` once either
/// side starts tearing the connection down. Named/Authenticated are not
/// mutually exclusive with message posting — the gate is "has a
/// nickname", which both states satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Named,
    Authenticated,
    Closing,
}

/// A queued outbound frame, already encoded. Shared (`Bytes`) so one
/// encode can serve many subscribers in a single fan-out (§4.4).
pub type OutboundFrame = Bytes;

pub struct Session {
    pub id: SessionId,
    pub remote_addr: IpAddr,
    pub peer_protocol_version: u8,
    pub connected_at: Instant,

    state: Mutex<SessionState>,
    nickname: Mutex<Option<String>>,
    user_id: Mutex<Option<UserId>>,
    is_admin: Mutex<bool>,
    /// Symmetric session key negotiated for DM traffic addressed to
    /// this connection (§4.6); `None` until a DM handshake completes.
    dm_key: Mutex<Option<[u8; 32]>>,
    /// Session-scoped X25519 public key uploaded via `PROVIDE_PUBLIC_KEY`
    /// / `UPLOAD_PUBLIC_KEY` (§4.6 step 2). Anonymous sessions have no
    /// `User` row to persist a key onto, so it lives here instead;
    /// authenticated sessions persist the same key onto their `User`
    /// (§3 `User.encryption_public_key`) and this field is left unset.
    encryption_public_key: Mutex<Option<[u8; 32]>>,

    pub rate_limiter: SessionRateLimiter,
    subscribed_channels: Mutex<HashSet<ChannelId>>,
    subscribed_threads: Mutex<HashSet<MessageId>>,
    subscribed_presence: Mutex<bool>,

    outbound_tx: mpsc::Sender<OutboundFrame>,
}

impl Session {
    pub fn new(
        id: SessionId,
        remote_addr: IpAddr,
        peer_protocol_version: u8,
        outbound_tx: mpsc::Sender<OutboundFrame>,
        rate_limiter: SessionRateLimiter,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            remote_addr,
            peer_protocol_version,
            connected_at: Instant::now(),
            state: Mutex::new(SessionState::Connected),
            nickname: Mutex::new(None),
            user_id: Mutex::new(None),
            is_admin: Mutex::new(false),
            dm_key: Mutex::new(None),
            encryption_public_key: Mutex::new(None),
            rate_limiter,
            subscribed_channels: Mutex::new(HashSet::new()),
            subscribed_threads: Mutex::new(HashSet::new()),
            subscribed_presence: Mutex::new(false),
            outbound_tx,
        })
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub async fn set_state(&self, state: SessionState) {
        *self.state.lock().await = state;
    }

    pub async fn nickname(&self) -> Option<String> {
        self.nickname.lock().await.clone()
    }

    pub async fn set_nickname(&self, nickname: String) {
        *self.nickname.lock().await = Some(nickname);
    }

    pub async fn user_id(&self) -> Option<UserId> {
        *self.user_id.lock().await
    }

    pub async fn set_user_id(&self, user_id: UserId) {
        *self.user_id.lock().await = Some(user_id);
    }

    pub async fn is_admin(&self) -> bool {
        *self.is_admin.lock().await
    }

    pub async fn set_is_admin(&self, value: bool) {
        *self.is_admin.lock().await = value;
    }

    pub async fn dm_key(&self) -> Option<[u8; 32]> {
        *self.dm_key.lock().await
    }

    pub async fn set_dm_key(&self, key: [u8; 32]) {
        *self.dm_key.lock().await = Some(key);
    }

    pub async fn encryption_public_key(&self) -> Option<[u8; 32]> {
        *self.encryption_public_key.lock().await
    }

    pub async fn set_encryption_public_key(&self, key: [u8; 32]) {
        *self.encryption_public_key.lock().await = Some(key);
    }

    pub async fn subscribe_channel(&self, channel_id: ChannelId) -> bool {
        self.subscribed_channels.lock().await.insert(channel_id)
    }

    pub async fn unsubscribe_channel(&self, channel_id: ChannelId) -> bool {
        self.subscribed_channels.lock().await.remove(&channel_id)
    }

    pub async fn channel_subscription_count(&self) -> usize {
        self.subscribed_channels.lock().await.len()
    }

    pub async fn subscribed_channel_ids(&self) -> Vec<ChannelId> {
        self.subscribed_channels.lock().await.iter().copied().collect()
    }

    pub async fn subscribe_thread(&self, thread_root_id: MessageId) -> bool {
        self.subscribed_threads.lock().await.insert(thread_root_id)
    }

    pub async fn unsubscribe_thread(&self, thread_root_id: MessageId) -> bool {
        self.subscribed_threads.lock().await.remove(&thread_root_id)
    }

    pub async fn thread_subscription_count(&self) -> usize {
        self.subscribed_threads.lock().await.len()
    }

    pub async fn set_presence_subscribed(&self, value: bool) {
        *self.subscribed_presence.lock().await = value;
    }

    pub async fn presence_subscribed(&self) -> bool {
        *self.subscribed_presence.lock().await
    }

    /// Enqueues a frame for delivery; drops it (counted by the caller)
    /// rather than block when the connection's write queue is full
    /// (§4.4 "slow consumer" handling).
    pub fn try_send(&self, frame: OutboundFrame) -> Result<(), OutboundFrame> {
        self.outbound_tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(f) => f,
            mpsc::error::TrySendError::Closed(f) => f,
        })
    }
}

/// The live registry of connected sessions, keyed by [`SessionId`].
/// Transports register on accept and deregister on disconnect;
/// [`crate::subscriptions::SubscriptionRegistry`] looks sessions up by
/// id to deliver frames.
#[derive(Default, Clone)]
pub struct SessionTable {
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.remove(&id).map(|(_, s)| s)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn count_for_addr(&self, addr: IpAddr) -> usize {
        self.sessions.iter().filter(|e| e.remote_addr == addr).count()
    }

    pub fn iter(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.clone()).collect()
    }
}
