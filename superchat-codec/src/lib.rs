//! The SuperChat wire protocol: frame envelope, primitive encodings and
//! the client/server message registry.
//!
//! Frame layout (all integers big-endian):
//!
//! ```text
//! [length u32][version u8][type u8][flags u8][payload...]
//! ```
//!
//! `length` covers everything after itself (version + type + flags +
//! payload) and excludes itself. See [`frame`] for the envelope and
//! [`primitive`] for the payload building blocks.

pub mod error;
pub mod frame;
pub mod messages;
pub mod primitive;

pub use error::CodecError;
pub use frame::{Frame, FrameFlags, PROTOCOL_VERSION};
pub use messages::MessageType;
