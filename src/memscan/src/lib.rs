//! # memscan
//!
//! Building blocks for incremental re-scanning of a target's address space.
//!
//! This library provides:
//! - [`Region`]: a normalized `[base, base + size)` span with alignment,
//!   inclusive containment and deterministic chunking
//! - [`LruCache`]: a bounded, thread-safe least-recently-used cache keyed by
//!   chunk base address
//! - Memory sources (dump files, in-memory buffers) and a maps parser
//! - [`Rescanner`]: repeated passes that report which chunks changed
//!
//! ## Example
//!
//! ```
//! use memscan::{LruCache, Region};
//!
//! let region = Region::new(0x1003, 0x2500).with_alignment(8);
//! let chunks = region.chunk(0x1000).unwrap();
//! assert_eq!(chunks.len(), 3);
//!
//! let cache = LruCache::new(2);
//! for chunk in &chunks {
//!     cache.add(chunk.base_address(), chunk.size());
//! }
//! assert_eq!(cache.get(chunks[0].base_address()), None);
//! assert_eq!(cache.get(chunks[2].base_address()), Some(chunks[2].size()));
//! ```

pub mod cache;
pub mod maps;
pub mod options;
pub mod region;
pub mod rescan;
pub mod source;

#[doc(inline)]
pub use cache::{CacheStats, LruCache, DEFAULT_CAPACITY};
#[doc(inline)]
pub use maps::{coalesce_contiguous, parse_maps, parse_maps_file, MappedRegion, MapsError};
#[doc(inline)]
pub use options::ScanOptions;
#[doc(inline)]
pub use region::{coalesce, Chunks, Region, RegionError};
#[doc(inline)]
pub use rescan::{ChunkStatus, FailedChunk, PassReport, Rescanner, ScanError, SnapshotCache};
#[doc(inline)]
pub use source::{DumpFile, MemorySource, MockMemorySource, SourceError};
