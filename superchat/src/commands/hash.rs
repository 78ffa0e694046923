use anyhow::{Context, Result};
use data_encoding::HEXLOWER;
use superchat_common::helpers::hash::derive_password_key;
use superchat_common::types::Secret;

/// Derives the Argon2id key a client would send as `password_hash` on
/// `AUTH_REQUEST`/`REGISTER_USER`, so a client implementation can be
/// tested against a known nickname/password pair without going through
/// the wire protocol.
pub(crate) fn command(nickname: &str, password: &Secret<String>) -> Result<()> {
    let key = derive_password_key(password.expose_secret(), &nickname.to_lowercase())
        .context("deriving password key")?;
    println!("{}", HEXLOWER.encode(&key));
    Ok(())
}
