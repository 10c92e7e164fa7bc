//! Dump File Memory Source
//!
//! Memory source implementation for reading from raw memory dump files.
//!
//! Regions come from a `.maps` sidecar next to the dump (see
//! [`crate::maps`]). Each listed region's bytes start at its recorded
//! `dump_offset`. A read that crosses from one region into the next is
//! split at the boundary, since neighbours need not be adjacent in the
//! file. Without a sidecar the whole file is treated as a single
//! region starting at a caller-supplied base address.

use super::{MemorySource, SourceError};
use crate::maps::{self, MappedRegion};
use crate::region::Region;

use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub struct DumpFile {
    /// Memory-mapped dump file
    mmap: Mmap,
    /// Virtual address regions parsed from the maps file
    regions: Vec<MappedRegion>,
    /// Path to the dump file
    pub path: PathBuf,
}

impl DumpFile {
    /// Open a dump, picking up `<dump>.maps` if it exists.
    ///
    /// `base_address` is only used when there is no sidecar.
    pub fn open<P: AsRef<Path>>(path: P, base_address: u64) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let maps_path = path.with_extension("maps");
        if maps_path.exists() {
            Self::open_with_maps(path, &maps_path)
        } else {
            Self::open_flat(path, base_address)
        }
    }

    /// Open a dump described by an explicit maps listing.
    pub fn open_with_maps<P, M>(path: P, maps_path: M) -> Result<Self, SourceError>
    where
        P: AsRef<Path>,
        M: AsRef<Path>,
    {
        let regions = maps::parse_maps_file(maps_path.as_ref())?;
        tracing::debug!(
            maps = %maps_path.as_ref().display(),
            regions = regions.len(),
            "loaded dump layout"
        );
        Self::map(path.as_ref(), |_| regions)
    }

    /// Open a dump as one region of the file's length at `base_address`.
    pub fn open_flat<P: AsRef<Path>>(path: P, base_address: u64) -> Result<Self, SourceError> {
        Self::map(path.as_ref(), |len| {
            vec![MappedRegion::new(Region::new(base_address, len), "rw-p")]
        })
    }

    fn map<F>(path: &Path, regions: F) -> Result<Self, SourceError>
    where
        F: FnOnce(u64) -> Vec<MappedRegion>,
    {
        let file = File::open(path)?;

        // SAFETY: the mapping is read-only; the dump must not be truncated
        // while it is open.
        let mmap = unsafe { Mmap::map(&file) }?;

        tracing::info!(
            path = %path.display(),
            bytes = mmap.len(),
            "opened dump file"
        );

        let regions = regions(mmap.len() as u64);
        Ok(DumpFile {
            mmap,
            regions,
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// File bytes backing `[va, va + len)`, which must lie in `region`.
    fn span(&self, region: &MappedRegion, va: u64, len: u64) -> Option<&[u8]> {
        let start = region.dump_offset.checked_add(va - region.start())?;
        let end = start.checked_add(len)?;
        let start = usize::try_from(start).ok()?;
        let end = usize::try_from(end).ok()?;
        self.mmap.get(start..end)
    }
}

impl MemorySource for DumpFile {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>, SourceError> {
        let out_of_range = || SourceError::OutOfRange {
            address,
            size: size as u64,
        };

        if self.find_region(address).is_none() {
            return Err(SourceError::Unmapped(address));
        }

        let mut bytes = Vec::with_capacity(size);
        let mut cursor = address;
        let mut remaining = size as u64;

        while remaining > 0 {
            let region = self.find_region(cursor).ok_or_else(out_of_range)?;
            let len = remaining.min(region.end() - cursor);
            let span = self.span(region, cursor, len).ok_or_else(out_of_range)?;

            bytes.extend_from_slice(span);
            cursor += len;
            remaining -= len;
        }

        Ok(bytes)
    }

    fn regions(&self) -> &[MappedRegion] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_dump(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_flat_dump_reads_at_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), "flat.bin", 0x100);

        let dump = DumpFile::open(&path, 0x40_0000).unwrap();
        assert_eq!(dump.len(), 0x100);
        assert_eq!(dump.regions().len(), 1);
        assert_eq!(dump.regions()[0].start(), 0x40_0000);
        assert_eq!(dump.regions()[0].end(), 0x40_0100);

        assert_eq!(dump.read_bytes(0x40_0010, 3).unwrap(), vec![0x10, 0x11, 0x12]);
    }

    #[test]
    fn test_flat_dump_rejects_unmapped_and_overlong_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), "flat.bin", 0x100);
        let dump = DumpFile::open_flat(&path, 0x1000).unwrap();

        assert!(matches!(
            dump.read_bytes(0x800, 4),
            Err(SourceError::Unmapped(0x800))
        ));
        assert!(matches!(
            dump.read_bytes(0x10f0, 0x20),
            Err(SourceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_sidecar_maps_translate_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), "game.dmp", 0x200);
        fs::write(
            dir.path().join("game.maps"),
            "0x140000000 0x140000100 256 0x0\n0x7f0000000000 0x7f0000000100 256 0x100\n",
        )
        .unwrap();

        let dump = DumpFile::open(&path, 0).unwrap();
        assert_eq!(dump.regions().len(), 2);

        assert_eq!(dump.read_bytes(0x140000000, 1).unwrap(), vec![0]);
        // second region starts at dump offset 0x100
        assert_eq!(dump.read_bytes(0x7f0000000000, 1).unwrap(), vec![(0x100 % 251) as u8]);
        assert!(dump.read_bytes(0x150000000, 1).is_err());
    }

    #[test]
    fn test_read_spanning_regions_follows_each_dump_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swapped.dmp");
        // the higher region is stored first in the file
        let mut data = vec![0xbbu8; 0x100];
        data.extend(vec![0xaau8; 0x100]);
        fs::write(&path, data).unwrap();
        fs::write(
            dir.path().join("swapped.maps"),
            "0x1000 0x1100 256 0x100
0x1100 0x1200 256 0x0
",
        )
        .unwrap();

        let dump = DumpFile::open(&path, 0).unwrap();
        let bytes = dump.read_bytes(0x10fe, 4).unwrap();
        assert_eq!(bytes, vec![0xaa, 0xaa, 0xbb, 0xbb]);

        assert!(matches!(
            dump.read_bytes(0x11fe, 4),
            Err(SourceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_proc_sidecar_ignores_mapped_file_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), "proc.dmp", 0x200);
        fs::write(
            dir.path().join("proc.maps"),
            "400000-400100 r--p 00000000 08:01 7 /usr/bin/target
             400100-400200 r-xp 00005000 08:01 7 /usr/bin/target
",
        )
        .unwrap();

        let dump = DumpFile::open(&path, 0).unwrap();
        // second region is stored right after the first, not at 0x5000
        assert_eq!(
            dump.read_bytes(0x400100, 1).unwrap(),
            vec![(0x100 % 251) as u8]
        );
    }

    #[test]
    fn test_explicit_maps_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), "image.raw", 0x100);
        let maps_path = dir.path().join("layout.txt");
        fs::write(&maps_path, "10000-10100 r--p 00000000 00:00 0\n").unwrap();

        let dump = DumpFile::open_with_maps(&path, &maps_path).unwrap();
        assert!(dump.is_readable(0x10000));
        assert_eq!(dump.read_bytes(0x10001, 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            DumpFile::open("/nonexistent/memscan.dmp", 0),
            Err(SourceError::Io(_))
        ));
    }
}
