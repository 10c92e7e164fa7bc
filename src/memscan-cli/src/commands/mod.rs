//! Command handlers for memscan CLI
//!
//! Each submodule handles a specific command category.

pub mod chunk;
pub mod configure;
pub mod rescan;
