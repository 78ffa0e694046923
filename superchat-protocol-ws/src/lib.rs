//! WebSocket transport (§6: "WebSocket on a configurable port, carrying
//! identical frames in binary messages"). Grounded in the teacher's
//! `warpgate-protocol-http::api::proxy_ws_inner`, which splits a `poem`
//! upgraded socket into sink/stream halves and spawns one task per
//! direction; here there's only one direction of real work since a
//! binary message already *is* one complete on-wire frame, so there's
//! no byte-stream reassembly to do and [`superchat_core::transport::read_frame`]
//! is unused — only [`superchat_core::transport::process_frame`] applies.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use poem::listener::TcpListener;
use poem::web::websocket::{Message, WebSocket};
use poem::web::Data;
use poem::{handler, IntoResponse, Request, Route, Server};
use superchat_common::types::ListenEndpoint;
use superchat_common::SuperchatError;
use superchat_core::rate_limit::{ConnectionAdmission, SessionRateLimiter};
use superchat_core::session::{Session, SessionState};
use superchat_core::transport::{self, Disposition};
use superchat_core::Engine;
use tracing::{debug, info, warn};

/// Runs the WebSocket listener until its bound socket is dropped or an
/// unrecoverable bind error occurs.
pub async fn run(
    endpoint: ListenEndpoint,
    engine: Engine,
    admission: ConnectionAdmission,
) -> Result<(), SuperchatError> {
    let addr = endpoint.addr();
    let app = Route::new()
        .at("/", poem::get(ws_handler))
        .data(engine)
        .data(admission);
    info!(%addr, "WebSocket listener up");
    Server::new(TcpListener::bind(addr))
        .run(app)
        .await
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("websocket server: {e}")))
}

#[handler]
fn ws_handler(
    req: &Request,
    ws: WebSocket,
    Data(engine): Data<&Engine>,
    Data(admission): Data<&ConnectionAdmission>,
) -> impl IntoResponse {
    let peer_addr: SocketAddr = req
        .remote_addr()
        .as_socket_addr()
        .copied()
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    let engine = engine.clone();
    let admission = admission.clone();

    ws.on_upgrade(move |socket| async move {
        if let Err(err) = handle_socket(socket, peer_addr, engine, admission).await {
            debug!(%peer_addr, %err, "WebSocket connection ended with an error");
        }
    })
}

async fn handle_socket(
    socket: poem::web::websocket::WebSocketStream,
    peer_addr: SocketAddr,
    engine: Engine,
    admission: ConnectionAdmission,
) -> Result<(), SuperchatError> {
    let limits = engine.config.limits.clone();

    if !admission.try_admit(peer_addr.ip(), limits.max_connections_per_ip as usize) {
        debug!(%peer_addr, "connection refused: per-IP limit reached");
        return Ok(());
    }
    let admit_guard = scopeguard(peer_addr.ip(), admission.clone());

    let session_timeout = Duration::from_secs(limits.session_timeout_seconds);
    let write_deadline = Duration::from_secs(limits.write_deadline_seconds);
    let (mut sink, mut stream) = socket.split();

    // Negotiate the peer's protocol version off its first binary message
    // (§4.1), same contract as the TCP transport's first-frame peek —
    // here there's no byte-stream reassembly, the message already is
    // the whole frame.
    let first_wire = match tokio::time::timeout(session_timeout, stream.next()).await {
        Ok(Some(Ok(Message::Binary(bytes)))) => bytes::Bytes::from(bytes),
        _ => return Ok(()),
    };
    if transport::declared_body_len(&first_wire).is_none() {
        return Ok(());
    }
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
            let send = sink.send(Message::Binary(frame.to_vec()));
            if tokio::time::timeout(write_deadline, send).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
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
        let next = tokio::time::timeout(session_timeout, stream.next()).await;
        let wire = match next {
            Ok(Some(Ok(Message::Binary(bytes)))) => bytes::Bytes::from(bytes),
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_non_binary))) => continue,
            Ok(Some(Err(err))) => {
                debug!(session_id = %session.id, %err, "WebSocket read error");
                break;
            }
            Err(_elapsed) => {
                debug!(session_id = %session.id, "session inactivity timeout");
                break;
            }
        };
        if transport::declared_body_len(&wire).is_none() {
            warn!(session_id = %session.id, "malformed WebSocket frame, closing");
            break;
        }
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
