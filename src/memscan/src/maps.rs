//! Memory Map Listings
//!
//! Parses address-space listings into regions. Two line formats are
//! accepted:
//!
//! - Linux `/proc/pid/maps`: `START-END PERMS OFFSET DEV INODE [PATH]`
//! - Dump listings: `0xSTART 0xEND [SIZE] [0xDUMP_OFFSET]`
//!
//! Blank lines and lines starting with `#` are skipped.
//!
//! Every region records where its bytes sit in a dump image. A dump line
//! may name that position explicitly. Any other line is laid out directly
//! after the previous region, so a plain `/proc/pid/maps` listing describes
//! a dump made by concatenating its regions in listing order. The `OFFSET`
//! column of a `/proc` line is kept as `file_offset`; it locates the region
//! in the mapped file (a library or executable), not in the dump.

use crate::region::Region;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// A region from a memory map listing, with its permissions and backing.
#[derive(Debug, Clone)]
pub struct MappedRegion {
    pub region: Region,
    pub perms: String,
    /// Position of the region's first byte in the dump image
    pub dump_offset: u64,
    /// Offset into the mapped file, from a `/proc/pid/maps` listing
    pub file_offset: u64,
    pub path: Option<String>,
}

impl MappedRegion {
    pub fn new(region: Region, perms: &str) -> Self {
        MappedRegion {
            region,
            perms: perms.to_string(),
            dump_offset: 0,
            file_offset: 0,
            path: None,
        }
    }

    /// Builder form for setting the dump position.
    pub fn at_dump_offset(mut self, dump_offset: u64) -> Self {
        self.dump_offset = dump_offset;
        self
    }

    pub fn start(&self) -> u64 {
        self.region.base_address()
    }

    pub fn end(&self) -> u64 {
        self.region.end_address()
    }

    /// Half-open containment, unlike [`Region::contains_address`].
    pub fn covers(&self, address: u64) -> bool {
        address >= self.start() && address < self.end()
    }

    /// True if `next` starts inside or right after this region and its dump
    /// bytes continue this region's bytes.
    pub fn continues_into(&self, next: &MappedRegion) -> bool {
        next.start() >= self.start()
            && next.start() <= self.end()
            && self.dump_offset.checked_add(next.start() - self.start()) == Some(next.dump_offset)
    }

    /// Copy of this region realigned with [`Region::with_alignment`], with
    /// the dump offset moved along with the base.
    pub fn with_alignment(&self, alignment: u64) -> MappedRegion {
        let region = self.region.with_alignment(alignment);
        let base = region.base_address();
        let dump_offset = if base >= self.start() {
            self.dump_offset.saturating_add(base - self.start())
        } else {
            self.dump_offset.saturating_sub(self.start() - base)
        };

        MappedRegion {
            region,
            dump_offset,
            ..self.clone()
        }
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }
}

/// Parse a maps listing held in memory.
pub fn parse_maps(text: &str) -> Result<Vec<MappedRegion>, MapsError> {
    let mut regions = Vec::new();
    // Where the next region without an explicit dump offset starts
    let mut cursor = 0u64;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let region = if parts[0].starts_with("0x") || parts[0].starts_with("0X") {
            parse_dump_line(&parts, line_no, cursor)?
        } else {
            parse_proc_line(&parts, line_no, cursor)?
        };
        cursor = region.dump_offset.saturating_add(region.region.size());
        regions.push(region);
    }

    Ok(regions)
}

/// Sort by base address and merge neighbours whose dump bytes are
/// contiguous (see [`MappedRegion::continues_into`]).
///
/// Regions that touch in the address space but are stored apart in the dump
/// stay separate. A merged run keeps the permissions and path of its lowest
/// region.
pub fn coalesce_contiguous<I>(regions: I) -> Vec<MappedRegion>
where
    I: IntoIterator<Item = MappedRegion>,
{
    let mut sorted: Vec<MappedRegion> = regions.into_iter().collect();
    sorted.sort_by_key(|r| r.start());

    let mut merged: Vec<MappedRegion> = Vec::with_capacity(sorted.len());
    for mapped in sorted {
        match merged.last_mut() {
            Some(current) if current.continues_into(&mapped) => {
                let end = current.end().max(mapped.end());
                current.region.set_end_address(end);
            }
            _ => merged.push(mapped),
        }
    }

    merged
}

/// Read and parse a maps listing from disk.
pub fn parse_maps_file<P: AsRef<Path>>(path: P) -> Result<Vec<MappedRegion>, MapsError> {
    let text = fs::read_to_string(path)?;
    parse_maps(&text)
}

fn parse_dump_line(parts: &[&str], line: usize, cursor: u64) -> Result<MappedRegion, MapsError> {
    if parts.len() < 2 {
        return Err(MapsError::Parse {
            line,
            message: "expected at least a start and end address".to_string(),
        });
    }

    let start = parse_hex(parts[0], line)?;
    let end = parse_hex(parts[1], line)?;
    let dump_offset = match parts.get(3) {
        Some(s) => parse_hex(s, line)?,
        None => cursor,
    };

    Ok(MappedRegion::new(Region::from_bounds(start, end), "rw-p").at_dump_offset(dump_offset))
}

fn parse_proc_line(parts: &[&str], line: usize, cursor: u64) -> Result<MappedRegion, MapsError> {
    let (start, end) = parts[0].split_once('-').ok_or_else(|| MapsError::Parse {
        line,
        message: format!("expected START-END, got {:?}", parts[0]),
    })?;

    let start = parse_hex(start, line)?;
    let end = parse_hex(end, line)?;
    let perms = parts.get(1).copied().unwrap_or("");
    let file_offset = match parts.get(2) {
        Some(s) => parse_hex(s, line)?,
        None => 0,
    };
    // Paths may contain spaces
    let path = (parts.len() > 5).then(|| parts[5..].join(" "));

    Ok(MappedRegion {
        region: Region::from_bounds(start, end),
        perms: perms.to_string(),
        dump_offset: cursor,
        file_offset,
        path,
    })
}

fn parse_hex(field: &str, line: usize) -> Result<u64, MapsError> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);

    u64::from_str_radix(digits, 16).map_err(|e| MapsError::Parse {
        line,
        message: format!("invalid hex value {:?}: {}", field, e),
    })
}
