//! Memory Region Types
//!
//! An OS-independent description of a contiguous span `[base, base + size)`
//! of a target's address space, with alignment enforcement and chunking.
//!
//! Addresses are opaque integers and are never dereferenced here. All
//! arithmetic saturates instead of wrapping, so a region can always be
//! constructed; the only reported failure is an invalid chunk size.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("Invalid chunk size {0}: must be greater than zero")]
    InvalidChunkSize(i64),
}

/// A contiguous range of addresses in a target process.
///
/// Regions are ordered and compared by `base_address` alone; size and
/// alignment never participate. Two regions with the same base compare
/// equal even if they cover different spans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "RegionRepr", into = "RegionRepr")]
pub struct Region {
    base_address: u64,
    size: u64,
    alignment: u64,
}

impl Region {
    /// Create a region, clamping `size` so the end address cannot overflow.
    pub fn new(base_address: u64, size: u64) -> Self {
        Region {
            base_address,
            size: size.min(u64::MAX - base_address),
            alignment: 1,
        }
    }

    /// Create a region from a signed size. Negative sizes clamp to zero.
    pub fn from_signed(base_address: u64, size: i64) -> Self {
        Self::new(base_address, u64::try_from(size).unwrap_or(0))
    }

    /// Create a region spanning `[start, end)`. An inverted range is empty.
    pub fn from_bounds(start: u64, end: u64) -> Self {
        Self::new(start, end.saturating_sub(start))
    }

    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// One past the last byte of the region.
    pub fn end_address(&self) -> u64 {
        // size is clamped at construction, this never overflows
        self.base_address + self.size
    }

    /// Move the end of the region, keeping the base. An end below the base
    /// leaves an empty region.
    pub fn set_end_address(&mut self, end_address: u64) {
        self.size = end_address.saturating_sub(self.base_address);
    }

    /// Set the alignment and realign the base address.
    ///
    /// `alignment` is clamped to at least 1. If the base is not a multiple of
    /// it, the base moves up to the next multiple and the size is recomputed
    /// so the end address stays where it was. The region therefore shrinks,
    /// and becomes empty at the aligned base when the old end lies below it.
    ///
    /// When no higher multiple fits in the address space the base is rounded
    /// down instead.
    pub fn set_alignment(&mut self, alignment: u64) {
        let alignment = alignment.max(1);
        self.alignment = alignment;

        let misalignment = self.base_address % alignment;
        if misalignment == 0 {
            return;
        }

        let end = self.end_address();
        self.base_address = self
            .base_address
            .checked_add(alignment - misalignment)
            .unwrap_or(self.base_address - misalignment);
        self.size = end
            .saturating_sub(self.base_address)
            .min(u64::MAX - self.base_address);
    }

    /// Builder form of [`Region::set_alignment`].
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.set_alignment(alignment);
        self
    }

    /// True if `base <= address <= end`.
    ///
    /// Both bounds are inclusive, so an empty region still contains its own
    /// base address.
    pub fn contains_address(&self, address: u64) -> bool {
        self.base_address <= address && address <= self.end_address()
    }

    /// Grow the region downwards: the base moves down by `amount` and the
    /// size grows by `amount`.
    ///
    /// Only the global address clamp applies; callers are responsible for
    /// not expanding past meaningful address-space bounds. The base is not
    /// realigned; if it no longer satisfies the alignment, the alignment
    /// drops to 1.
    pub fn expand(&mut self, amount: u64) {
        self.base_address = self.base_address.saturating_sub(amount);
        self.size = self
            .size
            .saturating_add(amount)
            .min(u64::MAX - self.base_address);
        if self.base_address % self.alignment != 0 {
            self.alignment = 1;
        }
    }

    /// Partition the region into contiguous chunks of `chunk_size` bytes.
    ///
    /// The chunk size is clamped to the region size. Every chunk but the last
    /// is exactly `chunk_size` bytes; the last holds the remainder. An empty
    /// region yields no chunks.
    ///
    /// A chunk keeps the parent's alignment only when its own base satisfies
    /// it; otherwise its alignment is 1. Chunks are never moved.
    pub fn chunk(&self, chunk_size: i64) -> Result<Vec<Region>, RegionError> {
        Ok(self.chunks(chunk_size)?.collect())
    }

    /// Lazy form of [`Region::chunk`].
    pub fn chunks(&self, chunk_size: i64) -> Result<Chunks, RegionError> {
        if chunk_size <= 0 {
            return Err(RegionError::InvalidChunkSize(chunk_size));
        }

        // chunk_size is positive here
        let chunk_size = (chunk_size as u64).min(self.size).max(1);

        Ok(Chunks {
            next_base: self.base_address,
            remaining: self.size,
            chunk_size,
            alignment: self.alignment,
        })
    }

    /// Number of chunks [`Region::chunk`] would produce.
    pub fn chunk_count(&self, chunk_size: i64) -> Result<u64, RegionError> {
        let chunks = self.chunks(chunk_size)?;
        Ok(chunks.remaining.div_ceil(chunks.chunk_size))
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.base_address == other.base_address
    }
}

impl Eq for Region {}

impl PartialOrd for Region {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Region {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base_address.cmp(&other.base_address)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x}-{:#x} ({} bytes)",
            self.base_address,
            self.end_address(),
            self.size
        )
    }
}

/// Wire form of a region. Deserializing goes back through the clamping
/// constructors.
#[derive(Serialize, Deserialize)]
struct RegionRepr {
    base_address: u64,
    size: u64,
    #[serde(default = "default_alignment")]
    alignment: u64,
}

fn default_alignment() -> u64 {
    1
}

impl From<RegionRepr> for Region {
    fn from(repr: RegionRepr) -> Self {
        Region::new(repr.base_address, repr.size).with_alignment(repr.alignment)
    }
}

impl From<Region> for RegionRepr {
    fn from(region: Region) -> Self {
        RegionRepr {
            base_address: region.base_address,
            size: region.size,
            alignment: region.alignment,
        }
    }
}

/// Iterator over the chunks of a region, in ascending address order.
#[derive(Debug, Clone)]
pub struct Chunks {
    next_base: u64,
    remaining: u64,
    chunk_size: u64,
    alignment: u64,
}

impl Iterator for Chunks {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        if self.remaining == 0 {
            return None;
        }

        let size = self.remaining.min(self.chunk_size);
        let alignment = if self.next_base % self.alignment == 0 {
            self.alignment
        } else {
            1
        };
        let chunk = Region {
            base_address: self.next_base,
            size,
            alignment,
        };

        self.next_base += size;
        self.remaining -= size;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.div_ceil(self.chunk_size);
        match usize::try_from(count) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for Chunks {}

/// Sort regions by base address and merge any that overlap or touch.
///
/// Merged regions keep the alignment of the lowest region in the run.
pub fn coalesce<I>(regions: I) -> Vec<Region>
where
    I: IntoIterator<Item = Region>,
{
    let mut sorted: Vec<Region> = regions.into_iter().collect();
    sorted.sort();

    let mut merged: Vec<Region> = Vec::with_capacity(sorted.len());
    for region in sorted {
        match merged.last_mut() {
            Some(current) if region.base_address <= current.end_address() => {
                let end = current.end_address().max(region.end_address());
                current.set_end_address(end);
            }
            _ => merged.push(region),
        }
    }

    merged
}
