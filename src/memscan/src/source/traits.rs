//! Memory Source Trait
//!
//! Core abstraction for reading memory from various sources.

use crate::maps::{MapsError, MappedRegion};
use crate::region::Region;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Read of {size} bytes at {address:#x} is outside the source")]
    OutOfRange { address: u64, size: u64 },

    #[error("Address {0:#x} is not mapped")]
    Unmapped(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Maps error: {0}")]
    Maps(#[from] MapsError),
}

/// Trait for reading memory from various sources (dump file, buffer, etc.)
pub trait MemorySource: Send + Sync {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>, SourceError>;

    /// Get the list of memory regions
    fn regions(&self) -> &[MappedRegion];

    /// Read the full contents of a region
    fn read_region(&self, region: &Region) -> Result<Vec<u8>, SourceError> {
        let size = usize::try_from(region.size()).map_err(|_| SourceError::OutOfRange {
            address: region.base_address(),
            size: region.size(),
        })?;
        self.read_bytes(region.base_address(), size)
    }

    /// Find a region containing the given address
    fn find_region(&self, address: u64) -> Option<&MappedRegion> {
        self.regions().iter().find(|r| r.covers(address))
    }

    /// Check if an address is readable
    fn is_readable(&self, address: u64) -> bool {
        self.find_region(address)
            .map(|r| r.is_readable())
            .unwrap_or(false)
    }
}
