//! Chunk command handler
//!
//! Shows how a range would be partitioned into scan work units.

use anyhow::{Context, Result};
use memscan::Region;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ChunkListing {
    region: Region,
    end_address: u64,
    chunk_size: i64,
    chunks: Vec<Region>,
}

/// Handle the chunk command
pub fn handle(
    base: u64,
    size: i64,
    chunk_size: i64,
    alignment: Option<u64>,
    json: bool,
) -> Result<()> {
    let listing = build(base, size, chunk_size, alignment)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Region: {}", listing.region);
    println!(
        "{} chunk(s) of up to {:#x} bytes",
        listing.chunks.len(),
        listing.chunk_size
    );
    for (i, chunk) in listing.chunks.iter().enumerate() {
        println!("  [{:>4}] {}", i, chunk);
    }

    Ok(())
}

fn build(base: u64, size: i64, chunk_size: i64, alignment: Option<u64>) -> Result<ChunkListing> {
    let mut region = Region::from_signed(base, size);
    if let Some(alignment) = alignment {
        region.set_alignment(alignment);
        if region.base_address() != base {
            tracing::info!(
                from = base,
                to = region.base_address(),
                "base address realigned"
            );
        }
    }

    let chunks = region
        .chunk(chunk_size)
        .with_context(|| format!("Cannot chunk {}", region))?;

    Ok(ChunkListing {
        region,
        end_address: region.end_address(),
        chunk_size,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_listing() {
        let listing = build(0x1000, 0x2500, 0x1000, None).unwrap();
        assert_eq!(listing.chunks.len(), 3);
        assert_eq!(listing.end_address, 0x3500);
    }

    #[test]
    fn test_build_with_alignment() {
        let listing = build(0x1001, 0x100, 0x40, Some(0x10)).unwrap();
        assert_eq!(listing.region.base_address(), 0x1010);
        assert_eq!(listing.end_address, 0x1101);
        assert_eq!(listing.chunks[0].base_address(), 0x1010);
    }

    #[test]
    fn test_build_rejects_bad_chunk_size() {
        let err = build(0x1000, 0x100, 0, None).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid chunk size"));
    }

    #[test]
    fn test_listing_serializes() {
        let listing = build(0, 0x20, 0x10, None).unwrap();
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["chunks"].as_array().map(|a| a.len()), Some(2));
    }
}
