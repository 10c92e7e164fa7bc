//! Mock Memory Source
//!
//! A buffer-backed memory source. The buffer can be rewritten between scan
//! passes to simulate a target whose memory changes.

use super::{MemorySource, SourceError};
use crate::maps::MappedRegion;
use crate::region::Region;
use parking_lot::RwLock;

pub struct MockMemorySource {
    /// Raw memory data (contiguous, starting at base_address)
    data: RwLock<Vec<u8>>,
    /// Base virtual address for the data
    base_address: u64,
    regions: Vec<MappedRegion>,
}

impl MockMemorySource {
    /// Create a new mock with data at given base address
    pub fn new(data: Vec<u8>, base_address: u64) -> Self {
        let region = Region::new(base_address, data.len() as u64);
        Self {
            data: RwLock::new(data),
            base_address,
            regions: vec![MappedRegion::new(region, "rw-p")],
        }
    }

    /// Create with multiple regions
    ///
    /// Every region's `dump_offset` is reset to its distance from
    /// `base_address`, since the buffer holds all of them contiguously.
    pub fn with_regions(data: Vec<u8>, base_address: u64, regions: Vec<MappedRegion>) -> Self {
        let regions = regions
            .into_iter()
            .map(|r| {
                let offset = r.start().saturating_sub(base_address);
                r.at_dump_offset(offset)
            })
            .collect();

        Self {
            data: RwLock::new(data),
            base_address,
            regions,
        }
    }

    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Overwrite bytes at a virtual address
    pub fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), SourceError> {
        let mut data = self.data.write();
        let range = self.span(address, bytes.len(), data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn span(
        &self,
        address: u64,
        size: usize,
        len: usize,
    ) -> Result<std::ops::Range<usize>, SourceError> {
        let out_of_range = || SourceError::OutOfRange {
            address,
            size: size as u64,
        };

        let offset = address
            .checked_sub(self.base_address)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or_else(out_of_range)?;
        let end = offset.checked_add(size).ok_or_else(out_of_range)?;
        if end > len {
            return Err(out_of_range());
        }

        Ok(offset..end)
    }
}

impl MemorySource for MockMemorySource {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>, SourceError> {
        let data = self.data.read();
        let range = self.span(address, size, data.len())?;
        Ok(data[range].to_vec())
    }

    fn regions(&self) -> &[MappedRegion] {
        &self.regions
    }
}
