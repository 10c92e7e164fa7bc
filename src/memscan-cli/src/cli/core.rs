//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::number::{parse_address, parse_count};

#[derive(Parser)]
#[command(name = "memscan")]
#[command(about = "Chunk address ranges and re-scan memory dumps for changes", long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split an address range into scan-sized chunks
    #[command(visible_alias = "k")]
    Chunk {
        /// Base address (hex with 0x prefix, or decimal)
        #[arg(long, value_parser = parse_address)]
        base: u64,

        /// Size of the range in bytes
        #[arg(long, value_parser = parse_count, allow_hyphen_values = true)]
        size: i64,

        /// Bytes per chunk (uses configured default if not provided)
        #[arg(long, value_parser = parse_count, allow_hyphen_values = true)]
        chunk_size: Option<i64>,

        /// Align the base address before chunking
        #[arg(long, value_parser = parse_address)]
        alignment: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Repeatedly scan a memory dump and report chunks that changed
    #[command(visible_alias = "r")]
    Rescan {
        /// Path to a raw memory dump
        dump: PathBuf,

        /// Maps listing describing the dump (defaults to <dump>.maps if present)
        #[arg(long)]
        maps: Option<PathBuf>,

        /// Base address of the dump when no maps listing is available
        #[arg(long, value_parser = parse_address, default_value = "0")]
        base: u64,

        /// Number of passes to run
        #[arg(short, long, default_value_t = 2)]
        passes: u32,

        /// Delay between passes in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Bytes per chunk (uses configured default if not provided)
        #[arg(long, value_parser = parse_count, allow_hyphen_values = true)]
        chunk_size: Option<i64>,

        /// Worker threads (uses configured default if not provided)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Output one JSON report per pass
        #[arg(long)]
        json: bool,
    },

    /// Configure default scan settings
    #[command(visible_alias = "c")]
    Configure {
        /// Default bytes per chunk
        #[arg(long, value_parser = parse_count, allow_hyphen_values = true)]
        chunk_size: Option<i64>,

        /// Default region alignment
        #[arg(long, value_parser = parse_address)]
        alignment: Option<u64>,

        /// Number of chunk snapshots to keep between passes
        #[arg(long)]
        cache_capacity: Option<usize>,

        /// Default worker threads (0 = one per core)
        #[arg(long)]
        threads: Option<usize>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chunk_command() {
        let cli = Cli::try_parse_from([
            "memscan",
            "chunk",
            "--base",
            "0x1000",
            "--size",
            "0x2500",
            "--chunk-size",
            "0x1000",
        ])
        .unwrap();

        match cli.command {
            Commands::Chunk {
                base,
                size,
                chunk_size,
                alignment,
                json,
            } => {
                assert_eq!(base, 0x1000);
                assert_eq!(size, 0x2500);
                assert_eq!(chunk_size, Some(0x1000));
                assert_eq!(alignment, None);
                assert!(!json);
            }
            _ => panic!("expected chunk command"),
        }
    }

    #[test]
    fn test_parse_negative_chunk_size() {
        let cli = Cli::try_parse_from([
            "memscan", "k", "--base", "0", "--size", "16", "--chunk-size", "-4",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chunk {
                chunk_size: Some(-4),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_rescan_defaults() {
        let cli = Cli::try_parse_from(["memscan", "rescan", "memory.dmp"]).unwrap();
        match cli.command {
            Commands::Rescan {
                dump,
                maps,
                base,
                passes,
                interval_ms,
                ..
            } => {
                assert_eq!(dump, PathBuf::from("memory.dmp"));
                assert!(maps.is_none());
                assert_eq!(base, 0);
                assert_eq!(passes, 2);
                assert_eq!(interval_ms, 1000);
            }
            _ => panic!("expected rescan command"),
        }
    }
}
