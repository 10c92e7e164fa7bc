//! Incremental Re-scanning
//!
//! Drives repeated passes over a memory source. Each pass chunks the
//! source's regions, reads every chunk on a worker pool and compares it with
//! the snapshot cached under the chunk's base address from the previous
//! pass.

use crate::cache::{CacheStats, LruCache};
use crate::options::ScanOptions;
use crate::maps;
use crate::region::{Region, RegionError};
use crate::source::MemorySource;

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Per-chunk snapshots keyed by chunk base address.
pub type SnapshotCache = LruCache<Arc<[u8]>>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to a chunk during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// No snapshot was cached for this chunk
    New,
    Unchanged,
    Changed,
    /// The read failed; any cached snapshot was dropped
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedChunk {
    pub region: Region,
    pub error: String,
}

/// Summary of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass: u64,
    pub chunks: usize,
    pub new: usize,
    pub unchanged: usize,
    /// Chunks whose bytes differ from the cached snapshot, in address order
    pub changed: Vec<Region>,
    pub failed: Vec<FailedChunk>,
    pub cache: CacheStats,
}

pub struct Rescanner<S> {
    source: S,
    options: ScanOptions,
    cache: Arc<SnapshotCache>,
    pool: rayon::ThreadPool,
    passes: u64,
}

impl<S: MemorySource> Rescanner<S> {
    /// Create a rescanner with its own snapshot cache.
    pub fn new(source: S, options: ScanOptions) -> Result<Self, ScanError> {
        let cache = Arc::new(LruCache::new(options.cache_capacity));
        Self::with_cache(source, options, cache)
    }

    /// Create a rescanner around an existing cache, e.g. one kept across
    /// sessions.
    pub fn with_cache(
        source: S,
        options: ScanOptions,
        cache: Arc<SnapshotCache>,
    ) -> Result<Self, ScanError> {
        if options.chunk_size <= 0 {
            return Err(RegionError::InvalidChunkSize(options.chunk_size).into());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|i| format!("memscan-{}", i))
            .build()?;

        Ok(Rescanner {
            source,
            options,
            cache,
            pool,
            passes: 0,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Work units for the next pass, in ascending address order.
    ///
    /// Regions are aligned, merged where their bytes are stored contiguously
    /// and then chunked, so a chunk never straddles two separately stored
    /// regions.
    pub fn plan(&self) -> Result<Vec<Region>, ScanError> {
        let regions = self
            .source
            .regions()
            .iter()
            .filter(|r| !self.options.readable_only || r.is_readable())
            .map(|r| r.with_alignment(self.options.alignment));

        let mut chunks = Vec::new();
        for mapped in maps::coalesce_contiguous(regions) {
            chunks.extend(mapped.region.chunks(self.options.chunk_size)?);
        }

        if chunks.len() > self.cache.capacity() {
            tracing::warn!(
                chunks = chunks.len(),
                capacity = self.cache.capacity(),
                "more chunks than cache slots; snapshots will be evicted between passes"
            );
        }

        Ok(chunks)
    }

    /// Read every chunk once and compare it with the previous pass.
    pub fn pass(&mut self) -> Result<PassReport, ScanError> {
        let chunks = self.plan()?;

        let outcomes: Vec<(Region, ChunkStatus)> = {
            let this = &*self;
            this.pool.install(|| {
                chunks
                    .par_iter()
                    .map(|chunk| (*chunk, this.visit(chunk)))
                    .collect()
            })
        };

        self.passes += 1;
        let mut report = PassReport {
            pass: self.passes,
            chunks: outcomes.len(),
            new: 0,
            unchanged: 0,
            changed: Vec::new(),
            failed: Vec::new(),
            cache: self.cache.stats(),
        };

        for (region, status) in outcomes {
            match status {
                ChunkStatus::New => report.new += 1,
                ChunkStatus::Unchanged => report.unchanged += 1,
                ChunkStatus::Changed => report.changed.push(region),
                ChunkStatus::Failed(error) => report.failed.push(FailedChunk { region, error }),
            }
        }

        tracing::info!(
            pass = report.pass,
            chunks = report.chunks,
            new = report.new,
            unchanged = report.unchanged,
            changed = report.changed.len(),
            failed = report.failed.len(),
            "scan pass complete"
        );

        Ok(report)
    }

    /// Forget all snapshots, e.g. after the target process changed.
    pub fn reset(&mut self) {
        self.cache.flush();
        self.passes = 0;
    }

    fn visit(&self, chunk: &Region) -> ChunkStatus {
        let key = chunk.base_address();

        let fresh: Arc<[u8]> = match self.source.read_region(chunk) {
            Ok(bytes) => Arc::from(bytes),
            Err(e) => {
                tracing::warn!(chunk = %chunk, error = %e, "chunk read failed");
                self.cache.delete(key);
                return ChunkStatus::Failed(e.to_string());
            }
        };

        match self.cache.get(key) {
            None => {
                self.cache.add(key, fresh);
                ChunkStatus::New
            }
            Some(previous) if previous == fresh => ChunkStatus::Unchanged,
            Some(_) => {
                // get() already refreshed recency; another worker may have
                // evicted the entry since
                if !self.cache.try_update(key, Arc::clone(&fresh)) {
                    self.cache.add(key, fresh);
                }
                tracing::debug!(chunk = %chunk, "chunk changed");
                ChunkStatus::Changed
            }
        }
    }
}
