mod cli;
mod commands;
mod config;
mod display;

use anyhow::Result;
use clap::Parser;
use config::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Watch {
            target,
            addresses,
            size,
            ticks,
            display_ms,
            json,
        } => {
            let config = Config::load()?;
            let addresses = addresses
                .iter()
                .map(|a| display::parse_address(a))
                .collect::<Result<Vec<_>>>()?;
            let source = commands::attach(&target, &config)?;

            let options = commands::watch::WatchOptions {
                addresses,
                size,
                ticks,
                display_interval: Duration::from_millis(display_ms),
                json,
            };
            commands::watch::handle(Arc::new(source), config.cache, &options)?;
        }

        Commands::Read {
            target,
            address,
            size,
        } => {
            let config = Config::load()?;
            let source = commands::attach(&target, &config)?;
            commands::read::handle(&source, &address, size)?;
        }

        Commands::Configure {
            process,
            interval_ms,
            retention_ms,
            no_retention,
            show,
        } => {
            commands::configure::handle(commands::configure::ConfigureArgs {
                process,
                interval_ms,
                retention_ms,
                no_retention,
                show,
            })?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber; RUST_LOG wins over `--log-level`
fn init_logging(level: Option<&str>) {
    let fallback = level.unwrap_or("livemem=info").to_string();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
