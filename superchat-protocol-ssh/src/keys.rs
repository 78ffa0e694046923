//! Host key persistence (§9 "SSH host-key persistence": a server's
//! identity key is generated once on first run and reused thereafter so
//! clients aren't asked to re-trust a new fingerprint on every restart).
//! Grounded in the teacher's `warpgate-protocol-ssh::keys`, updated to
//! the `russh::keys` (ssh-key) API this workspace's `russh` pulls in.

use std::path::{Path, PathBuf};

use anyhow::Result;
use russh::keys::ssh_key::{Algorithm, LineEnding, PrivateKey};
use superchat_common::helpers::fs::secure_directory;
use tracing::info;

fn host_key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("ssh_host_ed25519_key")
}

/// Generates and persists the host key if one doesn't already exist.
/// Idempotent so it's safe to call on every `superchat setup` run.
pub fn ensure_host_key(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    secure_directory(data_dir)?;

    let path = host_key_path(data_dir);
    if path.exists() {
        return Ok(());
    }
    info!(path = %path.display(), "generating SSH host key");
    let key = PrivateKey::random(&mut rand::rng(), Algorithm::Ed25519)?;
    key.write_openssh_file(&path, LineEnding::LF)?;
    Ok(())
}

pub fn load_host_key(data_dir: &Path) -> Result<PrivateKey> {
    let path = host_key_path(data_dir);
    Ok(PrivateKey::read_openssh_file(&path)?)
}
