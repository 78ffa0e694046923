//! Authentication (§4.3 `AuthRequest`/`RegisterUser`, §4.6 for the SSH
//! transport's public-key path). Grounded in the shape of the teacher's
//! `warpgate-common::auth::cred::AuthCredential`, simplified to the two
//! credential kinds the spec actually names.

use superchat_common::helpers::hash::constant_time_eq;
use superchat_common::{SuperchatError, UserId};

use crate::memdb::{MemDb, User};

/// Registers a new account (§4.3 `RegisterUser`). The client has already
/// derived `password_hash` with Argon2id using the lowercased nickname
/// as salt (§4.6) — the server only ever sees that derived key, never
/// the plaintext password, and stores it verbatim.
pub async fn register_user(
    memdb: &MemDb,
    nickname: &str,
    password_hash: &[u8],
) -> Result<User, SuperchatError> {
    memdb.create_user(nickname, Some(password_hash.to_vec()), 0).await
}

/// Verifies an already-derived password key against the stored hash for
/// `nickname` (§4.3 `AuthRequest`). Returns the matched user on success.
/// A nickname with no account, or an account with no password set
/// (SSH-pubkey-only accounts never get one), both report the same
/// [`SuperchatError::Unauthenticated`] — the wire contract does not
/// distinguish "no such user" from "wrong password" here.
pub async fn verify_password(
    memdb: &MemDb,
    nickname: &str,
    password_hash: &[u8],
) -> Result<User, SuperchatError> {
    let user = memdb
        .get_user_by_nickname(nickname)
        .await
        .ok_or(SuperchatError::Unauthenticated)?;
    let stored = user.password_hash.as_deref().ok_or(SuperchatError::Unauthenticated)?;
    if !constant_time_eq(password_hash, stored) {
        return Err(SuperchatError::Unauthenticated);
    }
    if superchat_common::UserFlags(user.flags as u32).is_banned() {
        return Err(SuperchatError::Banned);
    }
    Ok(user)
}

/// Resolves (or silently creates) the account behind an SSH public key
/// (§4.6: "a new SSH connection whose key has never been seen
/// authenticates as a new auto-registered account named after its
/// fingerprint, unless the session later sends `SET_NICKNAME`").
/// `fingerprint` is the transport's rendering of the key (e.g.
/// `SHA256:…`), already unique per key.
pub async fn resolve_ssh_identity(memdb: &MemDb, fingerprint: &str) -> Result<User, SuperchatError> {
    if let Some(user) = memdb.get_user_by_nickname(fingerprint).await {
        return Ok(user);
    }
    memdb.create_user(fingerprint, None, 0).await
}

pub async fn is_admin(memdb: &MemDb, user_id: UserId) -> bool {
    memdb
        .get_user(user_id)
        .await
        .is_some_and(|u| superchat_common::UserFlags(u.flags as u32).is_admin())
}
