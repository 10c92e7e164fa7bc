//! CLI argument definitions for memscan
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod number;

pub use self::core::{Cli, Commands};
