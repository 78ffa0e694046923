//! Interactive and unattended first-run setup. Grounded in the
//! teacher's `warpgate::commands::setup`: prompt/derive a config store,
//! write it out, then bootstrap the first admin account — trimmed down
//! to SuperChat's single config file and three listeners (no TLS
//! certs, no HTTP/MySQL/Postgres protocols, no client keys).

use std::net::{Ipv6Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use superchat_common::config::Config;
use superchat_common::types::Secret;
use tracing::*;

use crate::commands::common::assert_interactive_terminal;
use crate::Commands;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    info!("Welcome to SuperChat {}", superchat_common::superchat_version());

    if cli.config.exists() {
        error!("Config file already exists at {}.", cli.config.display());
        error!("To generate a new config file, rename or delete the existing one first.");
        std::process::exit(1);
    }

    if let Commands::Setup = cli.command {
        assert_interactive_terminal();
    }

    let mut config_dir = cli.config.parent().unwrap_or_else(|| Path::new("."));
    if config_dir.as_os_str().is_empty() {
        config_dir = Path::new(".");
    }
    std::fs::create_dir_all(config_dir)?;

    let mut config = Config::default();

    match &cli.command {
        Commands::UnattendedSetup {
            data_path,
            tcp_port,
            websocket_port,
            ssh_port,
            ..
        } => {
            config.server.data_dir = config_dir.join(data_path);
            if let Some(port) = tcp_port {
                config.server.tcp = Some(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), *port).into());
            }
            if let Some(port) = websocket_port {
                config.server.websocket =
                    Some(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), *port).into());
            }
            if let Some(port) = ssh_port {
                config.server.ssh = Some(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), *port).into());
            }
        }
        _ => {
            let theme = ColorfulTheme::default();
            let data_path: String = dialoguer::Input::with_theme(&theme)
                .default("./data".to_owned())
                .with_prompt("Directory to store app data in")
                .interact_text()?;
            config.server.data_dir = config_dir.join(data_path);
        }
    }

    std::fs::create_dir_all(&config.server.data_dir)?;
    superchat_common::helpers::fs::secure_directory(&config.server.data_dir)?;

    let admin_password = Secret::new(match &cli.command {
        Commands::UnattendedSetup { admin_password: Some(p), .. } => p.to_owned(),
        Commands::UnattendedSetup { admin_password: None, .. } => {
            std::env::var("SUPERCHAT_ADMIN_PASSWORD").map_err(|_| {
                error!("You must supply the admin password either through --admin-password");
                error!("or the SUPERCHAT_ADMIN_PASSWORD environment variable.");
                std::process::exit(1);
            })?
        }
        _ => dialoguer::Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Set a password for the SuperChat admin user")
            .interact()?,
    });

    let toml = toml::to_string_pretty(&config).context("serializing config")?;
    std::fs::write(&cli.config, toml).with_context(|| format!("writing {}", cli.config.display()))?;
    info!("Saved config into {}", cli.config.display());

    superchat_protocol_ssh::keys::ensure_host_key(&config.server.data_dir)?;

    super::create_user::command(cli, "admin", &admin_password, true).await?;

    info!("");
    info!("Admin user credentials:");
    info!("  * Nickname: admin");
    info!("  * Password: <your password>");
    info!("");
    info!("You can now start SuperChat with:");
    info!(
        "  {} --config {} run",
        std::env::args().next().unwrap_or_else(|| "superchat".to_owned()),
        cli.config.display()
    );

    Ok(())
}
