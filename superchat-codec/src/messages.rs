//! The message type registry (§6) and the typed payload for each message.
//!
//! Codes 0x01–0x7F are client→server, 0x80–0xFF are server→client. The
//! partition is enforced by [`MessageType::is_client_to_server`] /
//! [`MessageType::is_server_to_client`]; handlers reject a client
//! message arriving with a server-side code (and vice versa) before
//! ever reaching the dispatcher.

use bytes::{Bytes, BytesMut};

use crate::error::CodecError;
use crate::primitive::{Decode, Encode, ScBytes, ScString};

macro_rules! define_message {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            $(pub $field: $ty),*
        }

        impl Encode for $name {
            fn encode(&self, buf: &mut BytesMut) {
                $(self.$field.encode(buf);)*
            }
        }

        impl Decode for $name {
            fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
                Ok(Self {
                    $($field: <$ty as Decode>::decode(buf)?),*
                })
            }
        }
    };
}

/// 8-bit message type codes, stable per §4.1/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    SetNickname = 0x02,
    AuthRequest = 0x03,
    ListChannels = 0x04,
    JoinChannel = 0x05,
    LeaveChannel = 0x06,
    CreateChannel = 0x07,
    RegisterUser = 0x08,
    ListMessages = 0x09,
    PostMessage = 0x0A,
    EditMessage = 0x0B,
    DeleteMessage = 0x0C,
    Disconnect = 0x0D,
    Ping = 0x10,
    StartDm = 0x19,
    ProvidePublicKey = 0x1A,
    AllowUnencrypted = 0x1B,
    AcceptUnencrypted = 0x1C,
    UploadPublicKey = 0x1D,
    DeclineDm = 0x1E,
    SubscribeThread = 0x51,
    UnsubscribeThread = 0x52,
    SubscribeChannel = 0x53,
    UnsubscribeChannel = 0x54,
    SubscribeServerPresence = 0x55,

    NicknameResponse = 0x82,
    AuthResponse = 0x83,
    ChannelList = 0x84,
    JoinResponse = 0x85,
    LeaveResponse = 0x86,
    ChannelCreated = 0x87,
    RegisterResponse = 0x88,
    MessageList = 0x89,
    MessagePosted = 0x8A,
    MessageEdited = 0x8B,
    MessageDeleted = 0x8C,
    NewMessage = 0x8D,
    Pong = 0x90,
    Error = 0x91,
    ServerConfig = 0x98,
    SubscribeOk = 0x99,
    UnsubscribeOk = 0x9A,
    KeyRequired = 0xA1,
    DmReady = 0xA2,
    DmPending = 0xA3,
    DmRequest = 0xA4,
    ChannelPresence = 0xAC,
    ServerPresence = 0xAD,
    DmParticipantLeft = 0xAE,
    DmDeclined = 0xAF,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use MessageType::*;
        Some(match value {
            0x02 => SetNickname,
            0x03 => AuthRequest,
            0x04 => ListChannels,
            0x05 => JoinChannel,
            0x06 => LeaveChannel,
            0x07 => CreateChannel,
            0x08 => RegisterUser,
            0x09 => ListMessages,
            0x0A => PostMessage,
            0x0B => EditMessage,
            0x0C => DeleteMessage,
            0x0D => Disconnect,
            0x10 => Ping,
            0x19 => StartDm,
            0x1A => ProvidePublicKey,
            0x1B => AllowUnencrypted,
            0x1C => AcceptUnencrypted,
            0x1D => UploadPublicKey,
            0x1E => DeclineDm,
            0x51 => SubscribeThread,
            0x52 => UnsubscribeThread,
            0x53 => SubscribeChannel,
            0x54 => UnsubscribeChannel,
            0x55 => SubscribeServerPresence,
            0x82 => NicknameResponse,
            0x83 => AuthResponse,
            0x84 => ChannelList,
            0x85 => JoinResponse,
            0x86 => LeaveResponse,
            0x87 => ChannelCreated,
            0x88 => RegisterResponse,
            0x89 => MessageList,
            0x8A => MessagePosted,
            0x8B => MessageEdited,
            0x8C => MessageDeleted,
            0x8D => NewMessage,
            0x90 => Pong,
            0x91 => Error,
            0x98 => ServerConfig,
            0x99 => SubscribeOk,
            0x9A => UnsubscribeOk,
            0xA1 => KeyRequired,
            0xA2 => DmReady,
            0xA3 => DmPending,
            0xA4 => DmRequest,
            0xAC => ChannelPresence,
            0xAD => ServerPresence,
            0xAE => DmParticipantLeft,
            0xAF => DmDeclined,
            _ => return None,
        })
    }

    pub fn is_client_to_server(self) -> bool {
        (self as u8) <= 0x7F
    }

    pub fn is_server_to_client(self) -> bool {
        !self.is_client_to_server()
    }
}

// ---- Client → server payloads ----------------------------------------

define_message!(SetNicknameMsg { nickname: ScString });
define_message!(AuthRequestMsg { nickname: ScString, password_hash: ScBytes });
define_message!(RegisterUserMsg { nickname: ScString, password_hash: ScBytes });
define_message!(ListChannelsMsg { from_id: u64, limit: u16 });
define_message!(JoinChannelMsg { channel_id: u64, subchannel_id: Option<u64> });
define_message!(LeaveChannelMsg { channel_id: u64 });
define_message!(CreateChannelMsg {
    name: ScString,
    description: ScString,
    channel_type: u8,
    retention_hours: u32,
    parent_channel_id: Option<u64>,
});
define_message!(ListMessagesMsg {
    channel_id: u64,
    parent_id: Option<u64>,
    limit: u16,
    before_id: Option<u64>,
    after_id: Option<u64>,
});
define_message!(PostMessageMsg {
    channel_id: u64,
    subchannel_id: Option<u64>,
    parent_id: Option<u64>,
    content: ScBytes,
    encrypted: u8,
});
define_message!(EditMessageMsg { message_id: u64, new_content: ScBytes });
define_message!(DeleteMessageMsg { message_id: u64 });
define_message!(PingMsg { client_timestamp: i64 });
define_message!(StartDmMsg { target_user: Option<u64>, target_session: Option<u64>, allow_unencrypted: u8 });
define_message!(ProvidePublicKeyMsg { public_key: ScBytes });
define_message!(UploadPublicKeyMsg { public_key: ScBytes });
define_message!(AllowUnencryptedMsg { channel_id: u64 });
define_message!(AcceptUnencryptedMsg { channel_id: u64 });
define_message!(DeclineDmMsg { channel_id: u64 });
define_message!(SubscribeThreadMsg { thread_root_id: u64 });
define_message!(UnsubscribeThreadMsg { thread_root_id: u64 });
define_message!(SubscribeChannelMsg { channel_id: u64 });
define_message!(UnsubscribeChannelMsg { channel_id: u64 });

// ---- Server → client payloads -----------------------------------------

define_message!(NicknameResponseMsg { success: u8, nickname: ScString, error_code: u16 });
define_message!(AuthResponseMsg { success: u8, user_id: Option<u64>, error_code: u16 });
define_message!(RegisterResponseMsg { success: u8, user_id: Option<u64>, error_code: u16 });
define_message!(ChannelListItemMsg {
    id: u64,
    name: ScString,
    description: ScString,
    channel_type: u8,
    parent_channel_id: Option<u64>,
});
define_message!(ChannelListMsg { channels: Vec<ChannelListItemMsg>, has_more: u8 });
define_message!(ChannelCreatedMsg { channel_id: u64 });
define_message!(JoinResponseMsg {
    success: u8,
    channel_id: u64,
    error_code: u16,
    recent_messages: Vec<MessageItemMsg>,
});
define_message!(LeaveResponseMsg { success: u8, channel_id: u64 });
define_message!(MessageItemMsg {
    id: u64,
    channel_id: u64,
    parent_id: Option<u64>,
    thread_root_id: Option<u64>,
    author_user_id: Option<u64>,
    author_nickname: ScString,
    content: ScBytes,
    encrypted: u8,
    created_at: i64,
    edited_at: Option<i64>,
    reply_count: u32,
});
define_message!(MessageListMsg { messages: Vec<MessageItemMsg>, has_more: u8 });
define_message!(MessagePostedMsg { success: u8, message_id: u64, error_code: u16 });
define_message!(MessageEditedMsg { message_id: u64, edited_at: i64 });
define_message!(MessageDeletedMsg { message_id: u64 });
define_message!(NewMessageMsg { message: MessageItemMsg });
define_message!(PongMsg { client_timestamp: i64 });
define_message!(ErrorMsg { code: u16, message: ScString });
define_message!(ServerConfigMsg {
    protocol_version: u8,
    max_frame_size: u32,
    max_message_length: u32,
    session_timeout_seconds: u32,
    rate_limit_per_minute: u32,
    max_channel_subscriptions: u32,
    max_thread_subscriptions: u32,
});
define_message!(SubscribeOkMsg { target_id: u64 });
define_message!(UnsubscribeOkMsg { target_id: u64 });
define_message!(KeyRequiredMsg { channel_id: Option<u64>, peer_user_id: Option<u64> });
define_message!(DmReadyMsg { channel_id: u64, peer_user_id: Option<u64>, peer_public_key: ScBytes });
define_message!(DmPendingMsg { channel_id: u64, target_nickname: ScString });
define_message!(DmRequestMsg { channel_id: u64, initiator_nickname: ScString, allow_unencrypted: u8 });
define_message!(ChannelPresenceMsg { channel_id: u64, user_count: u32 });
define_message!(ServerPresenceUserMsg { nickname: ScString, user_id: Option<u64> });
define_message!(ServerPresenceMsg { users: Vec<ServerPresenceUserMsg> });
define_message!(DmParticipantLeftMsg { channel_id: u64, nickname: ScString });
define_message!(DmDeclinedMsg { channel_id: u64, nickname: ScString });

/// A decoded client→server message, dispatched on `MessageType`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    SetNickname(SetNicknameMsg),
    AuthRequest(AuthRequestMsg),
    RegisterUser(RegisterUserMsg),
    ListChannels(ListChannelsMsg),
    JoinChannel(JoinChannelMsg),
    LeaveChannel(LeaveChannelMsg),
    CreateChannel(CreateChannelMsg),
    ListMessages(ListMessagesMsg),
    PostMessage(PostMessageMsg),
    EditMessage(EditMessageMsg),
    DeleteMessage(DeleteMessageMsg),
    Disconnect,
    Ping(PingMsg),
    StartDm(StartDmMsg),
    ProvidePublicKey(ProvidePublicKeyMsg),
    UploadPublicKey(UploadPublicKeyMsg),
    AllowUnencrypted(AllowUnencryptedMsg),
    AcceptUnencrypted(AcceptUnencryptedMsg),
    DeclineDm(DeclineDmMsg),
    SubscribeThread(SubscribeThreadMsg),
    UnsubscribeThread(UnsubscribeThreadMsg),
    SubscribeChannel(SubscribeChannelMsg),
    UnsubscribeChannel(UnsubscribeChannelMsg),
    SubscribeServerPresence,
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        use MessageType as T;
        match self {
            Self::SetNickname(_) => T::SetNickname,
            Self::AuthRequest(_) => T::AuthRequest,
            Self::RegisterUser(_) => T::RegisterUser,
            Self::ListChannels(_) => T::ListChannels,
            Self::JoinChannel(_) => T::JoinChannel,
            Self::LeaveChannel(_) => T::LeaveChannel,
            Self::CreateChannel(_) => T::CreateChannel,
            Self::ListMessages(_) => T::ListMessages,
            Self::PostMessage(_) => T::PostMessage,
            Self::EditMessage(_) => T::EditMessage,
            Self::DeleteMessage(_) => T::DeleteMessage,
            Self::Disconnect => T::Disconnect,
            Self::Ping(_) => T::Ping,
            Self::StartDm(_) => T::StartDm,
            Self::ProvidePublicKey(_) => T::ProvidePublicKey,
            Self::UploadPublicKey(_) => T::UploadPublicKey,
            Self::AllowUnencrypted(_) => T::AllowUnencrypted,
            Self::AcceptUnencrypted(_) => T::AcceptUnencrypted,
            Self::DeclineDm(_) => T::DeclineDm,
            Self::SubscribeThread(_) => T::SubscribeThread,
            Self::UnsubscribeThread(_) => T::UnsubscribeThread,
            Self::SubscribeChannel(_) => T::SubscribeChannel,
            Self::UnsubscribeChannel(_) => T::UnsubscribeChannel,
            Self::SubscribeServerPresence => T::SubscribeServerPresence,
        }
    }

    pub fn encode_payload(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Self::SetNickname(m) => m.encode(&mut buf),
            Self::AuthRequest(m) => m.encode(&mut buf),
            Self::RegisterUser(m) => m.encode(&mut buf),
            Self::ListChannels(m) => m.encode(&mut buf),
            Self::JoinChannel(m) => m.encode(&mut buf),
            Self::LeaveChannel(m) => m.encode(&mut buf),
            Self::CreateChannel(m) => m.encode(&mut buf),
            Self::ListMessages(m) => m.encode(&mut buf),
            Self::PostMessage(m) => m.encode(&mut buf),
            Self::EditMessage(m) => m.encode(&mut buf),
            Self::DeleteMessage(m) => m.encode(&mut buf),
            Self::Disconnect => {}
            Self::Ping(m) => m.encode(&mut buf),
            Self::StartDm(m) => m.encode(&mut buf),
            Self::ProvidePublicKey(m) => m.encode(&mut buf),
            Self::UploadPublicKey(m) => m.encode(&mut buf),
            Self::AllowUnencrypted(m) => m.encode(&mut buf),
            Self::AcceptUnencrypted(m) => m.encode(&mut buf),
            Self::DeclineDm(m) => m.encode(&mut buf),
            Self::SubscribeThread(m) => m.encode(&mut buf),
            Self::UnsubscribeThread(m) => m.encode(&mut buf),
            Self::SubscribeChannel(m) => m.encode(&mut buf),
            Self::UnsubscribeChannel(m) => m.encode(&mut buf),
            Self::SubscribeServerPresence => {}
        }
        buf.freeze()
    }

    pub fn decode(kind: MessageType, payload: &mut Bytes) -> Result<Self, CodecError> {
        use MessageType as T;
        Ok(match kind {
            T::SetNickname => Self::SetNickname(Decode::decode(payload)?),
            T::AuthRequest => Self::AuthRequest(Decode::decode(payload)?),
            T::RegisterUser => Self::RegisterUser(Decode::decode(payload)?),
            T::ListChannels => Self::ListChannels(Decode::decode(payload)?),
            T::JoinChannel => Self::JoinChannel(Decode::decode(payload)?),
            T::LeaveChannel => Self::LeaveChannel(Decode::decode(payload)?),
            T::CreateChannel => Self::CreateChannel(Decode::decode(payload)?),
            T::ListMessages => Self::ListMessages(Decode::decode(payload)?),
            T::PostMessage => Self::PostMessage(Decode::decode(payload)?),
            T::EditMessage => Self::EditMessage(Decode::decode(payload)?),
            T::DeleteMessage => Self::DeleteMessage(Decode::decode(payload)?),
            T::Disconnect => Self::Disconnect,
            T::Ping => Self::Ping(Decode::decode(payload)?),
            T::StartDm => Self::StartDm(Decode::decode(payload)?),
            T::ProvidePublicKey => Self::ProvidePublicKey(Decode::decode(payload)?),
            T::UploadPublicKey => Self::UploadPublicKey(Decode::decode(payload)?),
            T::AllowUnencrypted => Self::AllowUnencrypted(Decode::decode(payload)?),
            T::AcceptUnencrypted => Self::AcceptUnencrypted(Decode::decode(payload)?),
            T::DeclineDm => Self::DeclineDm(Decode::decode(payload)?),
            T::SubscribeThread => Self::SubscribeThread(Decode::decode(payload)?),
            T::UnsubscribeThread => Self::UnsubscribeThread(Decode::decode(payload)?),
            T::SubscribeChannel => Self::SubscribeChannel(Decode::decode(payload)?),
            T::UnsubscribeChannel => Self::UnsubscribeChannel(Decode::decode(payload)?),
            T::SubscribeServerPresence => Self::SubscribeServerPresence,
            other if other.is_server_to_client() => {
                return Err(CodecError::UnknownMessageType(other as u8))
            }
            other => return Err(CodecError::UnknownMessageType(other as u8)),
        })
    }
}

/// A server→client message to be encoded onto the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    NicknameResponse(NicknameResponseMsg),
    AuthResponse(AuthResponseMsg),
    RegisterResponse(RegisterResponseMsg),
    ChannelList(ChannelListMsg),
    ChannelCreated(ChannelCreatedMsg),
    JoinResponse(JoinResponseMsg),
    LeaveResponse(LeaveResponseMsg),
    MessageList(MessageListMsg),
    MessagePosted(MessagePostedMsg),
    MessageEdited(MessageEditedMsg),
    MessageDeleted(MessageDeletedMsg),
    NewMessage(NewMessageMsg),
    Pong(PongMsg),
    Error(ErrorMsg),
    ServerConfig(ServerConfigMsg),
    SubscribeOk(SubscribeOkMsg),
    UnsubscribeOk(UnsubscribeOkMsg),
    KeyRequired(KeyRequiredMsg),
    DmReady(DmReadyMsg),
    DmPending(DmPendingMsg),
    DmRequest(DmRequestMsg),
    ChannelPresence(ChannelPresenceMsg),
    ServerPresence(ServerPresenceMsg),
    DmParticipantLeft(DmParticipantLeftMsg),
    DmDeclined(DmDeclinedMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        use MessageType as T;
        match self {
            Self::NicknameResponse(_) => T::NicknameResponse,
            Self::AuthResponse(_) => T::AuthResponse,
            Self::RegisterResponse(_) => T::RegisterResponse,
            Self::ChannelList(_) => T::ChannelList,
            Self::ChannelCreated(_) => T::ChannelCreated,
            Self::JoinResponse(_) => T::JoinResponse,
            Self::LeaveResponse(_) => T::LeaveResponse,
            Self::MessageList(_) => T::MessageList,
            Self::MessagePosted(_) => T::MessagePosted,
            Self::MessageEdited(_) => T::MessageEdited,
            Self::MessageDeleted(_) => T::MessageDeleted,
            Self::NewMessage(_) => T::NewMessage,
            Self::Pong(_) => T::Pong,
            Self::Error(_) => T::Error,
            Self::ServerConfig(_) => T::ServerConfig,
            Self::SubscribeOk(_) => T::SubscribeOk,
            Self::UnsubscribeOk(_) => T::UnsubscribeOk,
            Self::KeyRequired(_) => T::KeyRequired,
            Self::DmReady(_) => T::DmReady,
            Self::DmPending(_) => T::DmPending,
            Self::DmRequest(_) => T::DmRequest,
            Self::ChannelPresence(_) => T::ChannelPresence,
            Self::ServerPresence(_) => T::ServerPresence,
            Self::DmParticipantLeft(_) => T::DmParticipantLeft,
            Self::DmDeclined(_) => T::DmDeclined,
        }
    }

    pub fn encode_payload(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Self::NicknameResponse(m) => m.encode(&mut buf),
            Self::AuthResponse(m) => m.encode(&mut buf),
            Self::RegisterResponse(m) => m.encode(&mut buf),
            Self::ChannelList(m) => m.encode(&mut buf),
            Self::ChannelCreated(m) => m.encode(&mut buf),
            Self::JoinResponse(m) => m.encode(&mut buf),
            Self::LeaveResponse(m) => m.encode(&mut buf),
            Self::MessageList(m) => m.encode(&mut buf),
            Self::MessagePosted(m) => m.encode(&mut buf),
            Self::MessageEdited(m) => m.encode(&mut buf),
            Self::MessageDeleted(m) => m.encode(&mut buf),
            Self::NewMessage(m) => m.encode(&mut buf),
            Self::Pong(m) => m.encode(&mut buf),
            Self::Error(m) => m.encode(&mut buf),
            Self::ServerConfig(m) => m.encode(&mut buf),
            Self::SubscribeOk(m) => m.encode(&mut buf),
            Self::UnsubscribeOk(m) => m.encode(&mut buf),
            Self::KeyRequired(m) => m.encode(&mut buf),
            Self::DmReady(m) => m.encode(&mut buf),
            Self::DmPending(m) => m.encode(&mut buf),
            Self::DmRequest(m) => m.encode(&mut buf),
            Self::ChannelPresence(m) => m.encode(&mut buf),
            Self::ServerPresence(m) => m.encode(&mut buf),
            Self::DmParticipantLeft(m) => m.encode(&mut buf),
            Self::DmDeclined(m) => m.encode(&mut buf),
        }
        buf.freeze()
    }

    pub fn decode(kind: MessageType, payload: &mut Bytes) -> Result<Self, CodecError> {
        use MessageType as T;
        Ok(match kind {
            T::NicknameResponse => Self::NicknameResponse(Decode::decode(payload)?),
            T::AuthResponse => Self::AuthResponse(Decode::decode(payload)?),
            T::RegisterResponse => Self::RegisterResponse(Decode::decode(payload)?),
            T::ChannelList => Self::ChannelList(Decode::decode(payload)?),
            T::ChannelCreated => Self::ChannelCreated(Decode::decode(payload)?),
            T::JoinResponse => Self::JoinResponse(Decode::decode(payload)?),
            T::LeaveResponse => Self::LeaveResponse(Decode::decode(payload)?),
            T::MessageList => Self::MessageList(Decode::decode(payload)?),
            T::MessagePosted => Self::MessagePosted(Decode::decode(payload)?),
            T::MessageEdited => Self::MessageEdited(Decode::decode(payload)?),
            T::MessageDeleted => Self::MessageDeleted(Decode::decode(payload)?),
            T::NewMessage => Self::NewMessage(Decode::decode(payload)?),
            T::Pong => Self::Pong(Decode::decode(payload)?),
            T::Error => Self::Error(Decode::decode(payload)?),
            T::ServerConfig => Self::ServerConfig(Decode::decode(payload)?),
            T::SubscribeOk => Self::SubscribeOk(Decode::decode(payload)?),
            T::UnsubscribeOk => Self::UnsubscribeOk(Decode::decode(payload)?),
            T::KeyRequired => Self::KeyRequired(Decode::decode(payload)?),
            T::DmReady => Self::DmReady(Decode::decode(payload)?),
            T::DmPending => Self::DmPending(Decode::decode(payload)?),
            T::DmRequest => Self::DmRequest(Decode::decode(payload)?),
            T::ChannelPresence => Self::ChannelPresence(Decode::decode(payload)?),
            T::ServerPresence => Self::ServerPresence(Decode::decode(payload)?),
            T::DmParticipantLeft => Self::DmParticipantLeft(Decode::decode(payload)?),
            T::DmDeclined => Self::DmDeclined(Decode::decode(payload)?),
            other => return Err(CodecError::UnknownMessageType(other as u8)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_roundtrips_through_payload_bytes() {
        let msg = ClientMessage::PostMessage(PostMessageMsg {
            channel_id: 1,
            subchannel_id: None,
            parent_id: None,
            content: ScBytes(b"hello".to_vec()),
            encrypted: 0,
        });
        let kind = msg.message_type();
        let mut payload = msg.encode_payload();
        let decoded = ClientMessage::decode(kind, &mut payload).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn server_message_roundtrips_through_payload_bytes() {
        let msg = ServerMessage::NewMessage(NewMessageMsg {
            message: MessageItemMsg {
                id: 42,
                channel_id: 1,
                parent_id: None,
                thread_root_id: None,
                author_user_id: None,
                author_nickname: "~alice".into(),
                content: ScBytes(b"hello".to_vec()),
                encrypted: 0,
                created_at: 1000,
                edited_at: None,
                reply_count: 0,
            },
        });
        let kind = msg.message_type();
        let mut payload = msg.encode_payload();
        let decoded = ServerMessage::decode(kind, &mut payload).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn message_type_partition_is_respected() {
        assert!(MessageType::PostMessage.is_client_to_server());
        assert!(MessageType::NewMessage.is_server_to_client());
        assert!(!MessageType::PostMessage.is_server_to_client());
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        assert!(MessageType::from_u8(0x7E).is_none());
    }
}
