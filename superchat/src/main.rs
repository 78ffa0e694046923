use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use superchat_common::types::Secret;

mod commands;
mod config;
mod logging;

#[derive(Parser)]
#[command(name = "superchat", version = superchat_common::superchat_version())]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, short, default_value = "config.toml", env = "SUPERCHAT_CONFIG")]
    pub config: PathBuf,

    /// Increase log verbosity (-d, -dd).
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs the server.
    Run,
    /// Interactive first-run setup: writes the config file, generates
    /// the SSH host key, and creates the first admin account.
    Setup,
    /// Unattended first-run setup for scripted deployments.
    UnattendedSetup {
        #[arg(long, default_value = "./data")]
        data_path: String,
        #[arg(long)]
        admin_password: Option<String>,
        #[arg(long)]
        tcp_port: Option<u16>,
        #[arg(long)]
        websocket_port: Option<u16>,
        #[arg(long)]
        ssh_port: Option<u16>,
    },
    /// Creates (or updates the password of) a user account.
    CreateUser {
        nickname: String,
        /// Reads the password from stdin instead of prompting.
        #[arg(long)]
        from_stdin: bool,
        /// Grants the admin flag to this account.
        #[arg(long)]
        admin: bool,
    },
    /// Derives the Argon2id password key the wire protocol calls "the
    /// password hash" — useful for testing a client against a known
    /// nickname/password pair.
    HashPassword { nickname: String },
    /// Validates the config file and database connectivity without
    /// starting any listeners.
    Check,
    /// Applies pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Setup | Commands::UnattendedSetup { .. } => {
            logging::init_logging(None, &cli)?;
            commands::setup::command(&cli).await
        }
        Commands::Run => {
            let config = config::load_config(&cli.config)?;
            logging::init_logging(Some(&config), &cli)?;
            commands::run::command(&cli, config).await
        }
        Commands::Check => {
            logging::init_logging(None, &cli)?;
            commands::check::command(&cli).await
        }
        Commands::Migrate => {
            logging::init_logging(None, &cli)?;
            commands::migrate::command(&cli).await
        }
        Commands::CreateUser { nickname, from_stdin, admin } => {
            logging::init_logging(None, &cli)?;
            let password = read_password(*from_stdin, "Password")?;
            commands::create_user::command(&cli, nickname, &password, *admin).await
        }
        Commands::HashPassword { nickname } => {
            logging::init_logging(None, &cli)?;
            let password = read_password(false, "Password to be hashed")?;
            commands::hash::command(nickname, &password)
        }
    }
}

fn read_password(from_stdin: bool, prompt: &str) -> Result<Secret<String>> {
    use std::io::IsTerminal;
    if from_stdin || !std::io::stdin().is_terminal() {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok(Secret::new(input.trim_end().to_owned()))
    } else {
        let input = dialoguer::Password::with_theme(&dialoguer::theme::ColorfulTheme::default())
            .with_prompt(prompt)
            .interact()?;
        Ok(Secret::new(input))
    }
}
