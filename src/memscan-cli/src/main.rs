mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use config::Config;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "memscan=debug,memscan_cli=debug"
    } else {
        "memscan=info,memscan_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Chunk {
            base,
            size,
            chunk_size,
            alignment,
            json,
        } => {
            let config = Config::load()?;
            let chunk_size = chunk_size.unwrap_or(config.scan.chunk_size);
            let alignment = alignment.or(match config.scan.alignment {
                1 => None,
                a => Some(a),
            });
            commands::chunk::handle(base, size, chunk_size, alignment, json)?;
        }

        Commands::Rescan {
            dump,
            maps,
            base,
            passes,
            interval_ms,
            chunk_size,
            threads,
            json,
        } => {
            let config = Config::load()?;
            let options = config.scan_options(chunk_size, threads);
            let args = commands::rescan::RescanArgs {
                dump: &dump,
                maps: maps.as_deref(),
                base,
                passes,
                interval: Duration::from_millis(interval_ms),
                json,
            };
            commands::rescan::handle(args, options)?;
        }

        Commands::Configure {
            chunk_size,
            alignment,
            cache_capacity,
            threads,
            show,
        } => {
            let settings = commands::configure::Settings {
                chunk_size,
                alignment,
                cache_capacity,
                threads,
            };
            commands::configure::handle(settings, show)?;
        }
    }

    Ok(())
}
