mod listen_endpoint;
mod secret;

pub use listen_endpoint::ListenEndpoint;
pub use secret::Secret;
use uuid::Uuid;

/// Identifies one TCP/WS/SSH connection for its lifetime. Not persisted;
/// assigned fresh on accept.
pub type SessionId = Uuid;

/// Primary key of the `user` table.
pub type UserId = i64;

/// Primary key of the `channel` table.
pub type ChannelId = i64;

/// Primary key of the `message` table. Monotonically increasing per
/// channel, not globally — see `superchat-core::memdb`.
pub type MessageId = i64;

/// `User.flags` bitfield (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserFlags(pub u32);

impl UserFlags {
    pub const ADMIN: u32 = 0b01;
    pub const BANNED: u32 = 0b10;

    pub fn is_admin(self) -> bool {
        self.0 & Self::ADMIN != 0
    }

    pub fn is_banned(self) -> bool {
        self.0 & Self::BANNED != 0
    }
}

/// `Channel.channel_type` (§3, glossary): 0 = linear chat, 1 = threaded forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelType {
    Chat = 0,
    Forum = 1,
}

impl ChannelType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Chat),
            1 => Some(Self::Forum),
            _ => None,
        }
    }
}
