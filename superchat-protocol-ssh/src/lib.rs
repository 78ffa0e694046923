//! SSH transport (§6: "SSH carries frames over a single session
//! channel's data stream, identical to TCP; public-key auth always
//! succeeds and identity is the key's fingerprint unless the session
//! later sends `SET_NICKNAME`"). Grounded in the teacher's
//! `warpgate-protocol-ssh::server::mod::run_server`'s accept loop and
//! `_run_stream`, stripped of the teacher's event-channel indirection
//! (multiplexed PTY/exec/SFTP/port-forward handling) since a SuperChat
//! connection only ever needs one thing: pubkey auth, then one channel
//! carrying length-prefixed frames.

pub mod keys;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use russh::keys::ssh_key::{HashAlg, PrivateKey, PublicKey};
use russh::server::{Auth, Handle, Handler};
use russh::{Channel, ChannelId, MethodSet};
use superchat_codec::{CodecError, Frame};
use superchat_common::types::ListenEndpoint;
use superchat_common::SuperchatError;
use superchat_core::rate_limit::{ConnectionAdmission, SessionRateLimiter};
use superchat_core::session::{Session, SessionState};
use superchat_core::transport::{self, Disposition};
use superchat_core::Engine;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runs the SSH listener until its bound socket is dropped or an
/// unrecoverable accept error occurs.
pub async fn run(
    endpoint: ListenEndpoint,
    engine: Engine,
    admission: ConnectionAdmission,
    host_key: PrivateKey,
) -> Result<(), SuperchatError> {
    let limits = engine.config.limits.clone();
    let config = Arc::new(russh::server::Config {
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        inactivity_timeout: Some(Duration::from_secs(limits.session_timeout_seconds)),
        methods: MethodSet::from(&[russh::MethodKind::PublicKey][..]),
        keys: vec![host_key],
        ..Default::default()
    });

    let mut incoming = Box::pin(endpoint.tcp_accept_stream().await?);
    info!(addr = ?endpoint.addr(), "SSH listener up");
    while let Some(accepted) = incoming.next().await {
        let stream = match accepted {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "SSH accept failed");
                continue;
            }
        };
        let Ok(peer_addr) = stream.peer_addr() else { continue };
        let limits = engine.config.limits.clone();
        if !admission.try_admit(peer_addr.ip(), limits.max_connections_per_ip as usize) {
            debug!(%peer_addr, "connection refused: per-IP limit reached");
            continue;
        }
        let config = config.clone();
        let engine = engine.clone();
        let admit_guard = AdmissionGuard { addr: peer_addr.ip(), admission: admission.clone() };
        tokio::spawn(async move {
            let handler = ChatHandler {
                engine,
                peer_addr,
                session: None,
                channel_id: None,
                outbound_rx: None,
                buffer: BytesMut::new(),
                pending_fingerprint: None,
                _admit_guard: admit_guard,
            };
            if let Err(err) = russh::server::run_stream(config, stream, handler).await {
                debug!(%peer_addr, %err, "SSH session ended with an error");
            }
        });
    }
    Ok(())
}

struct AdmissionGuard {
    addr: std::net::IpAddr,
    admission: ConnectionAdmission,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.admission.release(self.addr);
    }
}

/// One per SSH TCP connection. A connection only ever opens one
/// session channel (§6); its data stream is reassembled into frames
/// with the same length-prefix framing TCP uses.
struct ChatHandler {
    engine: Engine,
    peer_addr: SocketAddr,
    session: Option<Arc<Session>>,
    channel_id: Option<ChannelId>,
    /// Owned by the handler rather than a separate writer task — unlike
    /// TCP/WS there's no long-lived socket half to hand to a spawned
    /// task, just the `Handle` russh passes into each callback.
    outbound_rx: Option<mpsc::Receiver<Bytes>>,
    buffer: BytesMut,
    /// Fingerprint computed in `auth_publickey`, consumed once the
    /// session channel actually opens (russh doesn't hand the
    /// authenticated key back to later callbacks).
    pending_fingerprint: Option<String>,
    _admit_guard: AdmissionGuard,
}

impl ChatHandler {
    /// Pushes whatever has accumulated on the outbound queue onto the
    /// SSH channel. Called after every dispatched frame since nothing
    /// else is driving this connection's writes.
    async fn flush_outbound(&mut self, handle: &Handle, channel: ChannelId) {
        let Some(rx) = self.outbound_rx.as_mut() else { return };
        while let Ok(frame) = rx.try_recv() {
            if handle.data(channel, frame.to_vec().into()).await.is_err() {
                break;
            }
        }
    }

    /// Consumes as many complete frames as `self.buffer` currently
    /// holds, dispatching each one. Mirrors
    /// [`superchat_core::transport::read_frame`]'s framing rules but
    /// operates on an in-memory accumulator instead of an `AsyncRead`,
    /// since SSH channel data arrives as discrete packets rather than a
    /// continuous byte stream the handler can `read_exact` against.
    async fn drain_frames(&mut self, handle: &Handle, channel: ChannelId) -> Disposition {
        loop {
            if self.buffer.len() < 4 {
                return Disposition::Continue;
            }
            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&self.buffer[..4]);
            let len = u32::from_be_bytes(len_bytes);
            if Frame::would_exceed_max(len) {
                if let Some(session) = &self.session {
                    let _ = superchat_core::handlers::reply_error(
                        session,
                        &SuperchatError::InvalidMessage(CodecError::FrameTooLarge(len as usize).to_string()),
                    );
                }
                return Disposition::Close;
            }
            let total = 4 + len as usize;
            if self.buffer.len() < total {
                return Disposition::Continue;
            }
            let wire = self.buffer.split_to(total).freeze();

            let Some(session) = self.session.clone() else {
                return Disposition::Close;
            };
            if transport::process_frame(&self.engine, &session, wire).await == Disposition::Close {
                self.flush_outbound(handle, channel).await;
                return Disposition::Close;
            }
            self.flush_outbound(handle, channel).await;
        }
    }

    async fn teardown(&mut self) {
        if let Some(chat_session) = self.session.take() {
            chat_session.set_state(SessionState::Closing).await;
            superchat_core::handlers::cleanup_session(&self.engine, &chat_session).await;
        }
    }
}

impl Handler for ChatHandler {
    type Error = anyhow::Error;

    async fn auth_publickey(&mut self, user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();
        debug!(%user, %fingerprint, addr = %self.peer_addr, "SSH public-key auth");
        self.pending_fingerprint = Some(fingerprint);
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<russh::server::Msg>,
        session: &mut russh::server::Session,
    ) -> Result<bool, Self::Error> {
        if self.session.is_some() {
            // One chat session per connection (§6); reject a second channel.
            return Ok(false);
        }
        let channel_id = channel.id();
        let handle = session.handle();
        let limits = self.engine.config.limits.clone();

        let rate_limiter = SessionRateLimiter::new(
            std::num::NonZeroU32::new(limits.messages_per_minute.max(1)).expect("nonzero"),
        );
        let (outbound_tx, outbound_rx) = mpsc::channel(limits.write_queue_depth);
        let chat_session = Session::new(
            uuid::Uuid::new_v4(),
            self.peer_addr.ip(),
            superchat_codec::PROTOCOL_VERSION,
            outbound_tx,
            rate_limiter,
        );
        self.engine.sessions.insert(chat_session.clone());
        self.outbound_rx = Some(outbound_rx);

        let fingerprint = self.pending_fingerprint.clone().unwrap_or_else(|| {
            format!("SSH:{}", self.peer_addr)
        });
        match superchat_core::auth::resolve_ssh_identity(&self.engine.memdb, &fingerprint).await {
            Ok(user) => {
                chat_session.set_user_id(user.id).await;
                chat_session.set_nickname(user.nickname.clone()).await;
                chat_session.set_state(SessionState::Authenticated).await;
            }
            Err(err) => {
                warn!(%err, "SSH identity auto-registration failed");
            }
        }

        let config_frame = transport::server_config_message(&limits);
        if let Ok(wire) = superchat_core::handlers::encode_for(&config_frame, superchat_codec::PROTOCOL_VERSION) {
            let _ = chat_session.try_send(wire);
        }

        self.session = Some(chat_session);
        self.channel_id = Some(channel_id);
        self.flush_outbound(&handle, channel_id).await;
        Ok(true)
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut russh::server::Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) != self.channel_id {
            return Ok(());
        }
        self.buffer.extend_from_slice(data);
        let handle = session.handle();
        if self.drain_frames(&handle, channel).await == Disposition::Close {
            self.teardown().await;
            session.close(channel)?;
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        session: &mut russh::server::Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) == self.channel_id {
            self.teardown().await;
            session.close(channel)?;
        }
        Ok(())
    }
}
