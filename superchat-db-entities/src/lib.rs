#![allow(non_snake_case)]

pub mod AuditLogEntry;
pub mod Channel;
pub mod ChannelParticipant;
pub mod DmInvite;
pub mod Message;
pub mod SessionRecord;
pub mod User;
