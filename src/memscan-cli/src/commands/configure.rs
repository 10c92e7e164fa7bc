//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up memscan defaults.

use crate::config::Config;
use anyhow::Result;

/// Values passed on the command line; `None` leaves the setting alone
#[derive(Debug, Default)]
pub struct Settings {
    pub chunk_size: Option<i64>,
    pub alignment: Option<u64>,
    pub cache_capacity: Option<usize>,
    pub threads: Option<usize>,
}

impl Settings {
    fn is_empty(&self) -> bool {
        self.chunk_size.is_none()
            && self.alignment.is_none()
            && self.cache_capacity.is_none()
            && self.threads.is_none()
    }
}

/// Handle the configure command
pub fn handle(settings: Settings, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if settings.is_empty() {
        show_usage();
        return Ok(());
    }

    apply(&mut config, &settings)?;
    config.save()?;

    println!("Configuration updated");
    if let Ok(path) = Config::config_path() {
        println!("Config saved to: {}", path.display());
    }

    Ok(())
}

/// Display current configuration
fn show_config(config: &Config) {
    let scan = &config.scan;
    println!("Chunk size:     {:#x}", scan.chunk_size);
    println!("Alignment:      {}", scan.alignment);
    println!("Cache capacity: {}", scan.cache_capacity);
    if scan.threads == 0 {
        println!("Threads:        auto");
    } else {
        println!("Threads:        {}", scan.threads);
    }

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

fn apply(config: &mut Config, settings: &Settings) -> Result<()> {
    if let Some(chunk_size) = settings.chunk_size {
        anyhow::ensure!(chunk_size > 0, "Chunk size must be greater than zero");
        config.scan.chunk_size = chunk_size;
    }
    if let Some(alignment) = settings.alignment {
        config.scan.alignment = alignment.max(1);
    }
    if let Some(capacity) = settings.cache_capacity {
        anyhow::ensure!(capacity > 0, "Cache capacity must be greater than zero");
        config.scan.cache_capacity = capacity;
    }
    if let Some(threads) = settings.threads {
        config.scan.threads = threads;
    }
    Ok(())
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: memscan configure --chunk-size 0x10000 --cache-capacity 1024");
    println!("   or: memscan configure --show");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }

    #[test]
    fn test_apply_updates_only_given_fields() {
        let mut config = Config::default();
        let settings = Settings {
            chunk_size: Some(0x2000),
            threads: Some(4),
            ..Settings::default()
        };
        apply(&mut config, &settings).unwrap();

        assert_eq!(config.scan.chunk_size, 0x2000);
        assert_eq!(config.scan.threads, 4);
        assert_eq!(config.scan.cache_capacity, 1024);
    }

    #[test]
    fn test_apply_rejects_invalid_values() {
        let mut config = Config::default();
        let settings = Settings {
            chunk_size: Some(0),
            ..Settings::default()
        };
        assert!(apply(&mut config, &settings).is_err());

        let settings = Settings {
            cache_capacity: Some(0),
            ..Settings::default()
        };
        assert!(apply(&mut config, &settings).is_err());
    }

    #[test]
    fn test_empty_settings() {
        assert!(Settings::default().is_empty());
    }
}
