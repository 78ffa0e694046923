//! Password key derivation (§4.6).
//!
//! The client derives a 32-byte key with Argon2id, using the
//! lowercased nickname as the salt, and sends that key as the
//! "password hash" on `AUTH_REQUEST`/`REGISTER_USER`. The server never
//! sees the plaintext password — `derive_password_key` exists
//! server-side only for `superchat create-user` and SSH auto-registration
//! bootstrapping, which derive on behalf of a local operator.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::SuperchatError;

/// t=3, m=64 MiB, p=4, keyLen=32, per §4.6.
fn params() -> Params {
    #[allow(clippy::unwrap_used)] // constants are statically valid
    Params::new(64 * 1024, 3, 4, Some(32)).unwrap()
}

/// Derive the 32-byte password key the spec calls "the password hash".
/// `nickname` is lowercased by the caller's convention (case-preserving
/// storage, case-insensitive salt) before being used as the salt.
pub fn derive_password_key(password: &str, nickname_lower: &str) -> Result<[u8; 32], SuperchatError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params());
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), nickname_lower.as_bytes(), &mut out)
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("argon2: {e}")))?;
    Ok(out)
}

/// Constant-time comparison of two derived keys. Never short-circuits
/// on the first mismatching byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
