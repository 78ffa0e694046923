pub mod fs;
pub mod hash;
pub mod rng;
pub mod serde_base64;
pub mod serde_base64_secret;
