//! Loading and hot-reloading `config.toml` (§6 "Persisted state").
//! Grounded in the teacher's `warpgate::config::load_config` (a `config`
//! crate builder reading one named file) generalized with a `notify`
//! watcher feeding a `tokio::sync::watch` channel for the hot-reloadable
//! sections, per SPEC_FULL.md's supplemented "config hot-reload" feature.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use notify::{RecursiveMode, Watcher};
use superchat_common::config::Config;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = ConfigLoader::builder()
        .add_source(File::with_name(&path.to_string_lossy()))
        .add_source(Environment::with_prefix("SUPERCHAT").separator("__"))
        .build()
        .with_context(|| format!("reading {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Watches `path` for writes and pushes a freshly-reloaded [`Config`]
/// onto the returned channel on every change. A malformed edit is
/// logged and ignored — the last good config stays in effect until the
/// file is fixed, rather than the process crashing on a typo.
pub fn watch_config(path: impl AsRef<Path> + Send + 'static) -> Result<watch::Receiver<Config>> {
    let initial = load_config(path.as_ref())?;
    let (tx, rx) = watch::channel(initial);

    std::thread::spawn(move || {
        let path = path.as_ref().to_path_buf();
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = match notify::recommended_watcher(notify_tx) {
            Ok(w) => w,
            Err(err) => {
                error!(%err, "failed to start config watcher");
                return;
            }
        };
        if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
            error!(%err, "failed to watch config file");
            return;
        }
        for event in notify_rx {
            let Ok(event) = event else { continue };
            if !event.kind.is_modify() {
                continue;
            }
            match load_config(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "config reloaded");
                    let _ = tx.send(config);
                }
                Err(err) => warn!(%err, "config reload failed, keeping previous config"),
            }
        }
    });

    Ok(rx)
}
