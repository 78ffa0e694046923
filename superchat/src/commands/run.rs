//! `superchat run`. Wires up `MemDb`/`SessionTable`/`SubscriptionRegistry`
//! into an `Engine`, spawns the checkpointer, retention sweeper,
//! directory client and every enabled transport, then waits for
//! shutdown. Mirrors the shape of the teacher's `warpgate::commands::run`
//! (`FuturesUnordered` over the enabled protocol servers, a background
//! `cleanup_db` sweep, `sd_notify`/SIGUSR1 handling) with `cleanup_db`
//! replaced by the checkpointer + retention sweeper pair and the
//! protocol set swapped for TCP/WebSocket/SSH.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
#[cfg(target_os = "linux")]
use sd_notify::NotifyState;
use sea_orm::Database;
use tokio::signal::unix::SignalKind;
use tracing::*;

use superchat_common::config::Config;
use superchat_core::rate_limit::ConnectionAdmission;
use superchat_core::session::SessionTable;
use superchat_core::subscriptions::SubscriptionRegistry;
use superchat_core::{Engine, MemDb};

use crate::commands::common::sqlite_url;
use crate::config::watch_config;

pub(crate) async fn command(cli: &crate::Cli, config: Config) -> Result<()> {
    info!(version = %superchat_common::superchat_version(), "SuperChat");

    let connection = Database::connect(sqlite_url(&config.server.data_dir)).await?;
    superchat_db_migrations::migrate_database(&connection).await?;

    let (wal_tx, wal_rx) = tokio::sync::mpsc::unbounded_channel();
    let memdb = MemDb::new(wal_tx);
    let sessions = SessionTable::new();
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let config = Arc::new(config);
    let engine = Engine::new(memdb.clone(), sessions, subscriptions, config.clone());
    let admission = ConnectionAdmission::new();

    tokio::spawn(superchat_core::checkpoint::run(
        connection,
        wal_rx,
        Duration::from_millis(config.limits.checkpoint_interval_ms),
        config.limits.checkpoint_batch_threshold,
    ));

    tokio::spawn(superchat_core::retention::run(
        memdb,
        Duration::from_secs(config.limits.default_retention_hours as u64 * 3600 / 10),
    ));

    tokio::spawn(superchat_directory::run(config.directory.clone(), engine.clone()));

    type ProtocolFuture =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), superchat_common::SuperchatError>> + Send>>;

    let mut protocol_futures: futures::stream::FuturesUnordered<ProtocolFuture> =
        futures::stream::FuturesUnordered::new();

    if let Some(endpoint) = config.server.tcp.clone() {
        protocol_futures.push(Box::pin(superchat_protocol_tcp::run(
            endpoint,
            engine.clone(),
            admission.clone(),
        )) as ProtocolFuture);
    }

    if let Some(endpoint) = config.server.websocket.clone() {
        protocol_futures.push(Box::pin(superchat_protocol_ws::run(
            endpoint,
            engine.clone(),
            admission.clone(),
        )) as ProtocolFuture);
    }

    if let Some(endpoint) = config.server.ssh.clone() {
        superchat_protocol_ssh::keys::ensure_host_key(&config.server.data_dir)?;
        let host_key = superchat_protocol_ssh::keys::load_host_key(&config.server.data_dir)?;
        protocol_futures.push(Box::pin(superchat_protocol_ssh::run(
            endpoint,
            engine.clone(),
            admission.clone(),
            host_key,
        )) as ProtocolFuture);
    }

    if protocol_futures.is_empty() {
        anyhow::bail!("No transports are enabled in the config file, exiting");
    }

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("SuperChat is now running.");
        if let Some(e) = &config.server.tcp {
            info!("Accepting TCP connections on {:?}", e.addr());
        }
        if let Some(e) = &config.server.websocket {
            info!("Accepting WebSocket connections on {:?}", e.addr());
        }
        if let Some(e) = &config.server.ssh {
            info!("Accepting SSH connections on {:?}", e.addr());
        }
        info!("--------------------------------------------");
    }

    #[cfg(target_os = "linux")]
    if let Ok(true) = sd_notify::booted() {
        tokio::spawn(async {
            if let Err(error) = async {
                sd_notify::notify(false, &[NotifyState::Ready])?;
                loop {
                    sd_notify::notify(false, &[NotifyState::Watchdog])?;
                    tokio::time::sleep(Duration::from_secs(15)).await;
                }
                #[allow(unreachable_code)]
                Ok::<(), anyhow::Error>(())
            }
            .await
            {
                error!(?error, "Failed to communicate with systemd");
            }
        });
    }

    // Structural settings (listeners, data_dir) take effect on the next
    // `run`; only the log-worthy fact of a reload is surfaced here since
    // the running Engine holds its Config behind a plain Arc.
    if let Ok(mut config_rx) = watch_config(cli.config.clone()) {
        tokio::spawn(async move {
            while config_rx.changed().await.is_ok() {
                info!("config file changed on disk; restart to apply");
            }
        });
    }

    let mut sigusr1 = tokio::signal::unix::signal(SignalKind::user_defined1())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                std::process::exit(1);
            }
            _ = sigusr1.recv() => {
                break;
            }
            result = protocol_futures.next() => {
                match result {
                    Some(Err(error)) => {
                        error!(?error, "transport error");
                        std::process::exit(1);
                    }
                    None => break,
                    _ => (),
                }
            }
        }
    }

    info!("Exiting");
    Ok(())
}
