//! Scan tuning knobs shared by the library and the CLI config file.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: i64 = 0x10000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Bytes per work unit. Must be positive.
    pub chunk_size: i64,
    /// Alignment applied to every region before chunking
    pub alignment: u64,
    /// Number of chunk snapshots kept between passes
    pub cache_capacity: usize,
    /// Worker threads; 0 lets rayon decide
    pub threads: usize,
    /// Skip regions without read permission
    pub readable_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            alignment: 1,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            threads: 0,
            readable_only: true,
        }
    }
}
