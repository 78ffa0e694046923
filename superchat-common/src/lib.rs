pub mod config;
pub mod error;
pub mod helpers;
pub mod types;
pub mod version;

pub use config::Config;
pub use error::SuperchatError;
pub use types::*;
pub use version::superchat_version;
