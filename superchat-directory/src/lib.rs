//! Optional self-registration against a remote directory index (§2
//! "Directory client"). Grounded in the teacher's one-shot
//! `warpgate::commands::healthcheck` request (timeout + `Client`
//! builder), turned into a periodic background task the way §5's
//! "directory-registration task" describes.

use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use superchat_common::config::DirectoryConfig;
use superchat_core::Engine;
use tracing::{debug, warn};

#[derive(Serialize)]
struct Advertisement<'a> {
    hostname: &'a str,
    tcp_port: Option<u16>,
    websocket_port: Option<u16>,
    ssh_port: Option<u16>,
    connected_sessions: usize,
}

/// Runs until the process exits, re-advertising this server to the
/// configured directory index every `refresh_interval_seconds`. A
/// failed request is logged and retried on the next tick rather than
/// aborting the task — an unreachable directory is not a reason to stop
/// serving chat traffic.
pub async fn run(directory: DirectoryConfig, engine: Engine) -> anyhow::Result<()> {
    if !directory.enable {
        return Ok(());
    }
    let endpoint = directory
        .endpoint
        .as_ref()
        .context("directory.enable is true but directory.endpoint is unset")?
        .clone();
    let hostname = directory
        .public_hostname
        .clone()
        .unwrap_or_else(|| "unknown".to_owned());

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .build()
        .context("building directory HTTP client")?;

    let interval = Duration::from_secs(directory.refresh_interval_seconds.max(5));
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let server = engine.config.server.clone();
        let body = Advertisement {
            hostname: &hostname,
            tcp_port: server.tcp.as_ref().map(|e| e.port()),
            websocket_port: server.websocket.as_ref().map(|e| e.port()),
            ssh_port: server.ssh.as_ref().map(|e| e.port()),
            connected_sessions: engine.sessions.len(),
        };
        let send = client.post(&endpoint).json(&body).send();
        match tokio::time::timeout(Duration::from_secs(10), send).await {
            Ok(Ok(resp)) => {
                if let Err(err) = resp.error_for_status() {
                    warn!(%err, "directory registration rejected");
                } else {
                    debug!(%endpoint, "directory registration sent");
                }
            }
            Ok(Err(err)) => warn!(%err, "directory registration request failed"),
            Err(_elapsed) => warn!(%endpoint, "directory registration timed out"),
        }
    }
}
