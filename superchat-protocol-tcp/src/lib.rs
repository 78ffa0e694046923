//! Plain TCP transport (§6: "TCP default port 6465"). A thin byte-stream
//! adapter around [`superchat_core::transport`]: the reader task turns
//! raw bytes into frames with [`superchat_core::transport::read_frame`]
//! and drives them through [`superchat_core::transport::process_frame`];
//! the writer task drains the session's outbound queue straight onto the
//! socket. Mirrors the teacher's per-channel reader/writer task split in
//! `warpgate-protocol-ssh::server::session`, generalized from one SSH
//! channel to one TCP connection.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use superchat_common::types::ListenEndpoint;
use superchat_common::SuperchatError;
use superchat_core::rate_limit::{ConnectionAdmission, SessionRateLimiter};
use superchat_core::session::{Session, SessionState};
use superchat_core::transport::{self, Disposition};
use superchat_core::Engine;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Runs the TCP listener until its bound sockets are dropped or an
/// unrecoverable accept error occurs. One task per accepted connection;
/// never returns under normal operation.
pub async fn run(
    endpoint: ListenEndpoint,
    engine: Engine,
    admission: ConnectionAdmission,
) -> Result<(), SuperchatError> {
    let mut incoming = Box::pin(endpoint.tcp_accept_stream().await?);
    info!(addr = ?endpoint.addr(), "TCP listener up");
    while let Some(accepted) = incoming.next().await {
        let stream = match accepted {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "TCP accept failed");
                continue;
            }
        };
        let engine = engine.clone();
        let admission = admission.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, engine, admission).await {
                debug!(%err, "TCP connection ended with an error");
            }
        });
    }
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    engine: Engine,
    admission: ConnectionAdmission,
) -> Result<(), SuperchatError> {
    stream.set_nodelay(true).ok();
    let peer_addr: SocketAddr = stream.peer_addr()?;
    let limits = engine.config.limits.clone();

    if !admission.try_admit(peer_addr.ip(), limits.max_connections_per_ip as usize) {
        debug!(%peer_addr, "connection refused: per-IP limit reached");
        return Ok(());
    }
    let admit_guard = scopeguard(peer_addr.ip(), admission.clone());

    let session_timeout = Duration::from_secs(limits.session_timeout_seconds);
    let write_deadline = Duration::from_secs(limits.write_deadline_seconds);

    // Negotiate the peer's protocol version off its very first frame
    // (§4.1: "negotiated from the peer's SERVER_CONFIG or first frame")
    // before a Session even exists, since Session pins the version for
    // its whole lifetime.
    let (mut read_half, mut write_half) = stream.into_split();
    let first_wire = match tokio::time::timeout(session_timeout, transport::read_frame(&mut read_half)).await
    {
        Ok(Ok(Some(wire))) => wire,
        _ => return Ok(()),
    };
    let peer_version = first_wire.get(4).copied().unwrap_or(superchat_codec::PROTOCOL_VERSION);

    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::channel(limits.write_queue_depth);
    let rate_limiter = SessionRateLimiter::new(
        std::num::NonZeroU32::new(limits.messages_per_minute.max(1)).expect("nonzero"),
    );
    let session = Session::new(
        uuid::Uuid::new_v4(),
        peer_addr.ip(),
        peer_version,
        outbound_tx,
        rate_limiter,
    );
    engine.sessions.insert(session.clone());

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if tokio::time::timeout(write_deadline, write_half.write_all(&frame)).await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    let config_frame = transport::server_config_message(&limits);
    if let Ok(wire) = superchat_core::handlers::encode_for(&config_frame, peer_version) {
        let _ = session.try_send(wire);
    }

    if transport::process_frame(&engine, &session, first_wire).await == Disposition::Close {
        finish(&engine, &session, writer).await;
        drop(admit_guard);
        return Ok(());
    }

    loop {
        let wire = match tokio::time::timeout(session_timeout, transport::read_frame(&mut read_half)).await {
            Ok(Ok(Some(wire))) => wire,
            Ok(Ok(None)) => break,
            Ok(Err(err)) => {
                debug!(session_id = %session.id, %err, "TCP read error");
                break;
            }
            Err(_elapsed) => {
                debug!(session_id = %session.id, "session inactivity timeout");
                break;
            }
        };
        if transport::process_frame(&engine, &session, wire).await == Disposition::Close {
            break;
        }
    }

    session.set_state(SessionState::Closing).await;
    finish(&engine, &session, writer).await;
    drop(admit_guard);
    Ok(())
}

async fn finish(engine: &Engine, session: &std::sync::Arc<Session>, writer: tokio::task::JoinHandle<()>) {
    superchat_core::handlers::cleanup_session(engine, session).await;
    // Give the writer a best-effort window to flush whatever was already
    // queued (§5: "Graceful shutdown flushes pending writes best-effort
    // up to a deadline"); dropping the sender lets it drain and exit.
    let flush_deadline = Duration::from_secs(engine.config.limits.shutdown_flush_deadline_seconds);
    let _ = tokio::time::timeout(flush_deadline, writer).await;
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

fn scopeguard(addr: std::net::IpAddr, admission: ConnectionAdmission) -> AdmissionGuard {
    AdmissionGuard { addr, admission }
}
