use anyhow::Result;
use sea_orm::Database;
use tracing::*;

use crate::commands::common::sqlite_url;
use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    Database::connect(sqlite_url(&config.server.data_dir)).await?;
    info!("No problems found");
    Ok(())
}
