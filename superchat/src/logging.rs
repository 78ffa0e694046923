//! Structured logging setup (§9 ambient stack), grounded in the
//! teacher's `warpgate::logging::init_logging`: an `EnvFilter`-driven
//! `tracing-subscriber` registry, switched between a human-readable
//! console layer and a JSON layer depending on configuration.

use anyhow::{Context, Result};
use time::{format_description, UtcOffset};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use superchat_common::config::{Config, LogFormat};

use crate::Cli;

pub fn init_logging(config: Option<&Config>, cli: &Cli) -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        let default_directive = match cli.debug {
            0 => "superchat=info",
            1 => "superchat=debug",
            2 => "superchat=debug,russh=debug",
            _ => "debug",
        };
        std::env::set_var("RUST_LOG", default_directive);
    }

    let env_filter = EnvFilter::from_default_env();
    let log_format = config.map(|c| c.log.format).unwrap_or_default();
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().json();
            registry.with(layer).init();
        }
        LogFormat::Text => {
            let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
            let timer = OffsetTime::new(
                offset,
                format_description::parse("[day].[month].[year] [hour]:[minute]:[second]")
                    .context("static time format")?,
            );
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(console::user_attended())
                .with_target(!console::user_attended())
                .with_timer(timer);
            registry.with(layer).init();
        }
    }

    Ok(())
}
