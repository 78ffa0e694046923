//! The server-side engine (§4): MemDB, sessions, subscriptions,
//! handlers, rate limiting, auth and DM crypto. Transports
//! (`superchat-protocol-{tcp,ws,ssh}`) depend on this crate and never
//! touch MemDB or the subscription registry directly — they go through
//! [`handlers::dispatch`].

pub mod auth;
pub mod checkpoint;
pub mod dm_crypto;
pub mod handlers;
pub mod memdb;
pub mod rate_limit;
pub mod retention;
pub mod session;
pub mod subscriptions;
pub mod transport;

pub use handlers::Engine;
pub use memdb::MemDb;
pub use session::{Session, SessionState, SessionTable};
pub use subscriptions::SubscriptionRegistry;
