//! Transport-agnostic plumbing shared by `superchat-protocol-{tcp,ws,ssh}`
//! (§5: "Implementers in languages without green threads should use an
//! I/O reactor plus a small thread pool, mapping each session to a pair
//! of state machines" — here every transport gets the *same* pair of
//! state machines, differing only in how bytes reach them).
//!
//! A transport's reader task only needs to (a) get one frame's worth of
//! on-wire bytes (length prefix included) from its medium and (b) hand
//! them to [`process_frame`]; everything past that point — version
//! negotiation, decode, dispatch, error replies, session teardown — is
//! identical across TCP, WebSocket and SSH, so it lives here once.

use std::sync::Arc;

use bytes::Bytes;
use superchat_codec::messages::{ClientMessage, ServerMessage};
use superchat_codec::{CodecError, Frame};
use superchat_common::config::LimitsConfig;
use superchat_common::SuperchatError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::handlers::{self, Engine};
use crate::session::{Session, SessionState};

/// What the driving transport should do after [`process_frame`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Close,
}

/// The `SERVER_CONFIG` frame every transport sends immediately on
/// accept (§4.2 state 1: "Server immediately emits SERVER_CONFIG
/// (protocol version, limits)").
pub fn server_config_message(limits: &LimitsConfig) -> ServerMessage {
    ServerMessage::ServerConfig(superchat_codec::messages::ServerConfigMsg {
        protocol_version: superchat_codec::PROTOCOL_VERSION,
        max_frame_size: limits.max_frame_bytes,
        max_message_length: limits.max_message_bytes,
        session_timeout_seconds: limits.session_timeout_seconds as u32,
        rate_limit_per_minute: limits.messages_per_minute,
        max_channel_subscriptions: limits.max_channel_subscriptions,
        max_thread_subscriptions: limits.max_thread_subscriptions,
    })
}

/// Reads exactly one on-wire frame (`[len u32][version][type][flags][payload]`)
/// from a byte-stream transport (TCP, SSH channel data). Returns `Ok(None)`
/// on a clean EOF with zero bytes read; an EOF mid-frame is
/// [`CodecError::UnexpectedEof`] via the wrapping I/O error.
///
/// The length prefix is validated against `MAX_FRAME_LEN` *before*
/// allocating the body buffer, so a malicious peer declaring a huge
/// length cannot force an allocation (§4.1 `FrameTooLarge`, §8 scenario 3).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Bytes>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf);
    if Frame::would_exceed_max(len) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            CodecError::FrameTooLarge(len as usize),
        ));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    let mut whole = Vec::with_capacity(4 + body.len());
    whole.extend_from_slice(&len_buf);
    whole.extend_from_slice(&body);
    Ok(Some(Bytes::from(whole)))
}

/// Decodes and dispatches one complete on-wire frame (length prefix
/// included) against `session`. Shared by every transport's reader loop.
pub async fn process_frame(
    engine: &Engine,
    session: &Arc<Session>,
    mut wire: Bytes,
) -> Disposition {
    let frame = match Frame::decode(&mut wire) {
        Ok(f) => f,
        Err(CodecError::FrameTooLarge(n)) => {
            warn!(session_id = %session.id, bytes = n, "oversized frame");
            let _ = handlers::reply_error(session, &SuperchatError::InvalidMessage("frame too large".into()));
            return Disposition::Close;
        }
        Err(err) => {
            debug!(session_id = %session.id, %err, "frame decode failed");
            let _ = handlers::reply_error(session, &SuperchatError::InvalidMessage(err.to_string()));
            return Disposition::Close;
        }
    };

    let Some(kind) = superchat_codec::MessageType::from_u8(frame.kind) else {
        let _ = handlers::reply_error(session, &SuperchatError::NotImplemented("unknown message type"));
        return Disposition::Continue;
    };
    if !kind.is_client_to_server() {
        let _ = handlers::reply_error(
            session,
            &SuperchatError::InvalidMessage("server-only message type sent by client".into()),
        );
        return Disposition::Continue;
    }

    let mut payload = frame.payload.clone();
    let msg = match ClientMessage::decode(kind, &mut payload) {
        Ok(m) => m,
        Err(err) => {
            let _ = handlers::reply_error(session, &SuperchatError::InvalidMessage(err.to_string()));
            return Disposition::Continue;
        }
    };

    if let Err(err) = handlers::dispatch(engine, session, msg).await {
        let _ = handlers::reply_error(session, &err);
    }

    if session.state().await == SessionState::Closing {
        Disposition::Close
    } else {
        Disposition::Continue
    }
}

/// Bytes remaining after the 4-byte length prefix, used by transports
/// that need to validate a WS message's declared length against its
/// actual size before calling [`process_frame`] (e.g. WebSocket, where
/// one binary message must be exactly one frame).
pub fn declared_body_len(wire: &Bytes) -> Option<u32> {
    if wire.len() < 4 {
        return None;
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&wire[..4]);
    Some(u32::from_be_bytes(len_bytes))
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use bytes::{BufMut, BytesMut};
    use superchat_codec::MessageType;
    use superchat_common::config::Config;

    use super::*;
    use crate::memdb::MemDb;
    use crate::rate_limit::SessionRateLimiter;
    use crate::subscriptions::SubscriptionRegistry;
    use crate::SessionTable;

    fn test_engine() -> Engine {
        let (wal_tx, mut wal_rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move { while wal_rx.recv().await.is_some() {} });
        Engine::new(
            MemDb::new(wal_tx),
            SessionTable::new(),
            Arc::new(SubscriptionRegistry::new()),
            Arc::new(Config::default()),
        )
    }

    fn test_session(engine: &Engine) -> (Arc<Session>, tokio::sync::mpsc::Receiver<Bytes>) {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let rate_limiter = SessionRateLimiter::new(NonZeroU32::new(20).unwrap());
        let session = Session::new(
            uuid::Uuid::new_v4(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            superchat_codec::PROTOCOL_VERSION,
            tx,
            rate_limiter,
        );
        engine.sessions.insert(session.clone());
        (session, rx)
    }

    /// §8 scenario 3: "a malformed peer sending a frame with
    /// length=2,000,000 ... server emits ERROR 1000 and closes."
    #[tokio::test]
    async fn oversized_declared_length_closes_the_connection_with_error_1000() {
        let engine = test_engine();
        let (session, mut rx) = test_session(&engine);

        let mut wire = BytesMut::new();
        wire.put_u32(2_000_000);
        wire.put_u8(superchat_codec::PROTOCOL_VERSION);
        wire.put_u8(0x0A);
        wire.put_u8(0);

        let disposition = process_frame(&engine, &session, wire.freeze()).await;
        assert_eq!(disposition, Disposition::Close);

        let outbound = rx.try_recv().expect("an ERROR frame was queued");
        let mut outbound = outbound;
        let frame = Frame::decode(&mut outbound).unwrap();
        let kind = MessageType::from_u8(frame.kind).unwrap();
        let mut payload = frame.payload;
        let ServerMessage::Error(err) = ServerMessage::decode(kind, &mut payload).unwrap() else {
            panic!("expected an ERROR reply");
        };
        assert_eq!(err.code, 1000);
    }
}
