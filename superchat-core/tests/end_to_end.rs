//! End-to-end scenarios driven straight through [`dispatch`], the same
//! entry point every transport calls — no TCP/WS/SSH socket involved.
//! Mirrors the shape of the spec's walkthrough scenarios: nickname +
//! post + broadcast, reply threading, and an oversized post getting
//! rejected.

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::sync::Arc;

use bytes::Bytes;
use superchat_codec::messages::{
    ClientMessage, CreateChannelMsg, DeclineDmMsg, ListMessagesMsg, MessageType, PostMessageMsg,
    RegisterUserMsg, ServerMessage, SetNicknameMsg, StartDmMsg, SubscribeChannelMsg,
    UploadPublicKeyMsg,
};
use superchat_codec::primitive::ScBytes;
use superchat_codec::Frame;
use superchat_common::config::Config;
use superchat_core::dm_crypto::{decrypt, encrypt, EphemeralKeypair};
use superchat_core::handlers::dispatch;
use superchat_core::rate_limit::SessionRateLimiter;
use superchat_core::session::{Session, SessionState, SessionTable};
use superchat_core::subscriptions::SubscriptionRegistry;
use superchat_core::{Engine, MemDb};
use tokio::sync::mpsc;

fn test_engine() -> Engine {
    let mut config = Config::default();
    config.policy.allow_anonymous_channel_creation = true;
    let (wal_tx, mut wal_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move { while wal_rx.recv().await.is_some() {} });
    Engine::new(
        MemDb::new(wal_tx),
        SessionTable::new(),
        Arc::new(SubscriptionRegistry::new()),
        Arc::new(config),
    )
}

fn test_session(engine: &Engine) -> (Arc<Session>, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(32);
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

async fn recv_message(rx: &mut mpsc::Receiver<Bytes>) -> ServerMessage {
    let wire = rx.try_recv().expect("expected a queued outbound frame");
    let mut wire = wire;
    let frame = Frame::decode(&mut wire).unwrap();
    let kind = MessageType::from_u8(frame.kind).expect("known message type");
    let mut payload = frame.payload;
    ServerMessage::decode(kind, &mut payload).unwrap()
}

#[tokio::test]
async fn nickname_post_and_broadcast_reach_a_subscriber() {
    let engine = test_engine();
    let (poster, mut poster_rx) = test_session(&engine);
    let (listener, mut listener_rx) = test_session(&engine);

    dispatch(&engine, &poster, ClientMessage::SetNickname(SetNicknameMsg { nickname: "alice".into() }))
        .await
        .unwrap();
    assert_eq!(poster.state().await, SessionState::Named);

    dispatch(
        &engine,
        &poster,
        ClientMessage::CreateChannel(CreateChannelMsg {
            name: "general".into(),
            description: "".into(),
            channel_type: 0,
            retention_hours: 0,
            parent_channel_id: None,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::ChannelCreated(created) = recv_message(&mut poster_rx).await else {
        panic!("expected ChannelCreated");
    };

    dispatch(
        &engine,
        &listener,
        ClientMessage::SubscribeChannel(SubscribeChannelMsg { channel_id: created.channel_id }),
    )
    .await
    .unwrap();
    let ServerMessage::SubscribeOk(_) = recv_message(&mut listener_rx).await else {
        panic!("expected SubscribeOk");
    };

    dispatch(
        &engine,
        &poster,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: created.channel_id,
            subchannel_id: None,
            parent_id: None,
            content: superchat_codec::primitive::ScBytes(b"hello, general".to_vec()),
            encrypted: 0,
        }),
    )
    .await
    .unwrap();

    let ServerMessage::MessagePosted(posted) = recv_message(&mut poster_rx).await else {
        panic!("expected MessagePosted ack");
    };
    assert_eq!(posted.success, 1);

    let ServerMessage::NewMessage(broadcast) = recv_message(&mut listener_rx).await else {
        panic!("expected a NewMessage broadcast");
    };
    assert_eq!(broadcast.message.author_nickname.0, "~alice");
    assert_eq!(broadcast.message.content.0, b"hello, general");
}

#[tokio::test]
async fn reply_carries_its_thread_root_to_thread_subscribers() {
    let engine = test_engine();
    let (author, mut author_rx) = test_session(&engine);
    let (thread_watcher, mut watcher_rx) = test_session(&engine);

    dispatch(&engine, &author, ClientMessage::SetNickname(SetNicknameMsg { nickname: "bob".into() })).await.unwrap();
    dispatch(
        &engine,
        &author,
        ClientMessage::CreateChannel(CreateChannelMsg {
            name: "forum".into(),
            description: "".into(),
            channel_type: 1,
            retention_hours: 0,
            parent_channel_id: None,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::ChannelCreated(created) = recv_message(&mut author_rx).await else { panic!() };

    dispatch(
        &engine,
        &author,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: created.channel_id,
            subchannel_id: None,
            parent_id: None,
            content: superchat_codec::primitive::ScBytes(b"root post".to_vec()),
            encrypted: 0,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessagePosted(root) = recv_message(&mut author_rx).await else { panic!() };

    dispatch(
        &engine,
        &thread_watcher,
        ClientMessage::SubscribeThread(superchat_codec::messages::SubscribeThreadMsg {
            thread_root_id: root.message_id,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::SubscribeOk(_) = recv_message(&mut watcher_rx).await else { panic!() };

    dispatch(
        &engine,
        &author,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: created.channel_id,
            subchannel_id: None,
            parent_id: Some(root.message_id),
            content: superchat_codec::primitive::ScBytes(b"a reply".to_vec()),
            encrypted: 0,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessagePosted(_) = recv_message(&mut author_rx).await else { panic!() };

    let ServerMessage::NewMessage(broadcast) = recv_message(&mut watcher_rx).await else {
        panic!("expected the reply broadcast to the thread subscriber");
    };
    assert_eq!(broadcast.message.thread_root_id, Some(root.message_id));
    assert_eq!(broadcast.message.parent_id, Some(root.message_id));
}

#[tokio::test]
async fn oversized_post_is_rejected_without_touching_memdb() {
    let engine = test_engine();
    let (session, mut rx) = test_session(&engine);

    dispatch(&engine, &session, ClientMessage::SetNickname(SetNicknameMsg { nickname: "eve".into() })).await.unwrap();
    dispatch(
        &engine,
        &session,
        ClientMessage::CreateChannel(CreateChannelMsg {
            name: "general".into(),
            description: "".into(),
            channel_type: 0,
            retention_hours: 0,
            parent_channel_id: None,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::ChannelCreated(created) = recv_message(&mut rx).await else { panic!() };

    let oversized = vec![0u8; engine.config.limits.max_message_bytes as usize + 1];
    dispatch(
        &engine,
        &session,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: created.channel_id,
            subchannel_id: None,
            parent_id: None,
            content: superchat_codec::primitive::ScBytes(oversized),
            encrypted: 0,
        }),
    )
    .await
    .unwrap();

    let ServerMessage::Error(err) = recv_message(&mut rx).await else {
        panic!("expected an ERROR reply for an oversized post");
    };
    assert_eq!(err.code, superchat_common::SuperchatError::TooLong("content").code());
}

#[tokio::test]
async fn reply_threading_lists_root_with_reply_count_and_filters_by_parent() {
    let engine = test_engine();
    let (author, mut author_rx) = test_session(&engine);

    dispatch(&engine, &author, ClientMessage::SetNickname(SetNicknameMsg { nickname: "carol".into() }))
        .await
        .unwrap();
    dispatch(
        &engine,
        &author,
        ClientMessage::CreateChannel(CreateChannelMsg {
            name: "general".into(),
            description: "".into(),
            channel_type: 0,
            retention_hours: 0,
            parent_channel_id: None,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::ChannelCreated(created) = recv_message(&mut author_rx).await else { panic!() };

    dispatch(
        &engine,
        &author,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: created.channel_id,
            subchannel_id: None,
            parent_id: None,
            content: superchat_codec::primitive::ScBytes(b"root".to_vec()),
            encrypted: 0,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessagePosted(root) = recv_message(&mut author_rx).await else { panic!() };

    dispatch(
        &engine,
        &author,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: created.channel_id,
            subchannel_id: None,
            parent_id: Some(root.message_id),
            content: superchat_codec::primitive::ScBytes(b"reply1".to_vec()),
            encrypted: 0,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessagePosted(reply1) = recv_message(&mut author_rx).await else { panic!() };

    dispatch(
        &engine,
        &author,
        ClientMessage::ListMessages(ListMessagesMsg {
            channel_id: created.channel_id,
            parent_id: None,
            limit: 50,
            before_id: None,
            after_id: None,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessageList(roots) = recv_message(&mut author_rx).await else { panic!() };
    assert_eq!(roots.messages.len(), 1);
    assert_eq!(roots.messages[0].id, root.message_id);
    assert_eq!(roots.messages[0].reply_count, 1);

    dispatch(
        &engine,
        &author,
        ClientMessage::ListMessages(ListMessagesMsg {
            channel_id: created.channel_id,
            parent_id: Some(root.message_id),
            limit: 50,
            before_id: None,
            after_id: None,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessageList(replies) = recv_message(&mut author_rx).await else { panic!() };
    assert_eq!(replies.messages.len(), 1);
    assert_eq!(replies.messages[0].id, reply1.message_id);
}

#[tokio::test]
async fn dm_happy_path_delivers_an_encrypted_message_both_sides_can_decrypt() {
    let engine = test_engine();
    let (u1, mut u1_rx) = test_session(&engine);
    let (u2, mut u2_rx) = test_session(&engine);

    dispatch(
        &engine,
        &u1,
        ClientMessage::RegisterUser(RegisterUserMsg {
            nickname: "u1".into(),
            password_hash: ScBytes(vec![0u8; 32]),
        }),
    )
    .await
    .unwrap();
    let ServerMessage::RegisterResponse(_r1) = recv_message(&mut u1_rx).await else { panic!() };

    dispatch(
        &engine,
        &u2,
        ClientMessage::RegisterUser(RegisterUserMsg {
            nickname: "u2".into(),
            password_hash: ScBytes(vec![0u8; 32]),
        }),
    )
    .await
    .unwrap();
    let ServerMessage::RegisterResponse(r2) = recv_message(&mut u2_rx).await else { panic!() };
    let u2_id = r2.user_id.expect("registration succeeds");

    let kp1 = EphemeralKeypair::generate();
    let kp2 = EphemeralKeypair::generate();
    dispatch(
        &engine,
        &u1,
        ClientMessage::UploadPublicKey(UploadPublicKeyMsg { public_key: ScBytes(kp1.public.to_vec()) }),
    )
    .await
    .unwrap();
    dispatch(
        &engine,
        &u2,
        ClientMessage::UploadPublicKey(UploadPublicKeyMsg { public_key: ScBytes(kp2.public.to_vec()) }),
    )
    .await
    .unwrap();

    dispatch(
        &engine,
        &u1,
        ClientMessage::StartDm(StartDmMsg { target_user: Some(u2_id), target_session: None, allow_unencrypted: 0 }),
    )
    .await
    .unwrap();

    let ServerMessage::DmReady(ready1) = recv_message(&mut u1_rx).await else {
        panic!("expected DM_READY for the initiator");
    };
    let ServerMessage::DmReady(ready2) = recv_message(&mut u2_rx).await else {
        panic!("expected DM_READY for the target");
    };
    assert_eq!(ready1.channel_id, ready2.channel_id);
    let channel_id = ready1.channel_id as superchat_common::ChannelId;

    let peer_pub_for_u1: [u8; 32] = ready1.peer_public_key.0.clone().try_into().unwrap();
    let peer_pub_for_u2: [u8; 32] = ready2.peer_public_key.0.clone().try_into().unwrap();
    let key1 = kp1.derive_shared_key(peer_pub_for_u1, channel_id).unwrap();
    let key2 = kp2.derive_shared_key(peer_pub_for_u2, channel_id).unwrap();
    assert_eq!(key1, key2);

    dispatch(
        &engine,
        &u2,
        ClientMessage::SubscribeChannel(SubscribeChannelMsg { channel_id: ready2.channel_id }),
    )
    .await
    .unwrap();
    let ServerMessage::SubscribeOk(_) = recv_message(&mut u2_rx).await else { panic!() };

    let ciphertext = encrypt(&key1, b"hi").unwrap();
    dispatch(
        &engine,
        &u1,
        ClientMessage::PostMessage(PostMessageMsg {
            channel_id: ready1.channel_id,
            subchannel_id: None,
            parent_id: None,
            content: ScBytes(ciphertext),
            encrypted: 1,
        }),
    )
    .await
    .unwrap();
    let ServerMessage::MessagePosted(posted) = recv_message(&mut u1_rx).await else { panic!() };
    assert_eq!(posted.success, 1);

    let ServerMessage::NewMessage(broadcast) = recv_message(&mut u2_rx).await else {
        panic!("expected NEW_MESSAGE for the DM peer");
    };
    assert_eq!(broadcast.message.encrypted, 1);
    let plaintext = decrypt(&key2, &broadcast.message.content.0).unwrap();
    assert_eq!(plaintext, b"hi");
}

#[tokio::test]
async fn dm_decline_removes_the_invite_and_notifies_the_initiator() {
    let engine = test_engine();
    let (u1, mut u1_rx) = test_session(&engine);
    let (u2, mut u2_rx) = test_session(&engine);

    dispatch(
        &engine,
        &u1,
        ClientMessage::RegisterUser(RegisterUserMsg {
            nickname: "dan".into(),
            password_hash: ScBytes(vec![0u8; 32]),
        }),
    )
    .await
    .unwrap();
    let ServerMessage::RegisterResponse(_r1) = recv_message(&mut u1_rx).await else { panic!() };

    dispatch(
        &engine,
        &u2,
        ClientMessage::RegisterUser(RegisterUserMsg {
            nickname: "erin".into(),
            password_hash: ScBytes(vec![0u8; 32]),
        }),
    )
    .await
    .unwrap();
    let ServerMessage::RegisterResponse(r2) = recv_message(&mut u2_rx).await else { panic!() };
    let u2_id = r2.user_id.unwrap();

    dispatch(
        &engine,
        &u1,
        ClientMessage::StartDm(StartDmMsg { target_user: Some(u2_id), target_session: None, allow_unencrypted: 1 }),
    )
    .await
    .unwrap();
    let ServerMessage::DmPending(pending) = recv_message(&mut u1_rx).await else {
        panic!("expected DM_PENDING for the initiator");
    };
    let ServerMessage::DmRequest(request) = recv_message(&mut u2_rx).await else {
        panic!("expected DM_REQUEST for the target");
    };
    assert_eq!(pending.channel_id, request.channel_id);

    dispatch(
        &engine,
        &u2,
        ClientMessage::DeclineDm(DeclineDmMsg { channel_id: request.channel_id }),
    )
    .await
    .unwrap();

    let ServerMessage::DmDeclined(declined) = recv_message(&mut u1_rx).await else {
        panic!("expected DM_DECLINED for the initiator");
    };
    assert_eq!(declined.nickname.0, "erin");
}
