//! Rescan command handler
//!
//! Runs repeated passes over a memory dump and prints which chunks changed
//! between them.

use anyhow::{Context, Result};
use memscan::{DumpFile, PassReport, Rescanner, ScanOptions};
use std::path::Path;
use std::thread;
use std::time::Duration;

pub struct RescanArgs<'a> {
    pub dump: &'a Path,
    pub maps: Option<&'a Path>,
    pub base: u64,
    pub passes: u32,
    pub interval: Duration,
    pub json: bool,
}

/// Handle the rescan command
pub fn handle(args: RescanArgs<'_>, options: ScanOptions) -> Result<()> {
    let source = match args.maps {
        Some(maps) => DumpFile::open_with_maps(args.dump, maps),
        None => DumpFile::open(args.dump, args.base),
    }
    .with_context(|| format!("Failed to open dump {}", args.dump.display()))?;

    let reports = run(source, options, args.passes, args.interval, |report| {
        print_report(report, args.json)
    })?;

    if !args.json {
        let changed: usize = reports.iter().skip(1).map(|r| r.changed.len()).sum();
        println!(
            "{} pass(es), {} chunk change(s) after the first pass",
            reports.len(),
            changed
        );
    }

    Ok(())
}

/// Run `passes` scan passes, sleeping `interval` between them.
fn run<F>(
    source: DumpFile,
    options: ScanOptions,
    passes: u32,
    interval: Duration,
    mut on_report: F,
) -> Result<Vec<PassReport>>
where
    F: FnMut(&PassReport) -> Result<()>,
{
    let mut scanner = Rescanner::new(source, options).context("Failed to set up scanner")?;
    let plan = scanner.plan()?;
    tracing::info!(
        chunks = plan.len(),
        path = %scanner.source().path.display(),
        "starting rescan"
    );

    let mut reports = Vec::with_capacity(passes as usize);
    for pass in 0..passes {
        if pass > 0 && !interval.is_zero() {
            thread::sleep(interval);
        }

        let report = scanner.pass()?;
        on_report(&report)?;
        reports.push(report);
    }

    Ok(reports)
}

fn print_report(report: &PassReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!(
        "Pass {}: {} chunks, {} new, {} unchanged, {} changed, {} failed",
        report.pass,
        report.chunks,
        report.new,
        report.unchanged,
        report.changed.len(),
        report.failed.len()
    );
    for region in &report.changed {
        println!("  changed {}", region);
    }
    for failed in &report.failed {
        println!("  failed  {}: {}", failed.region, failed.error);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_run_over_unchanged_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.dmp");
        fs::write(&path, vec![0xCCu8; 0x3000]).unwrap();

        let source = DumpFile::open(&path, 0x10000).unwrap();
        let options = ScanOptions {
            chunk_size: 0x1000,
            threads: 1,
            ..ScanOptions::default()
        };

        let mut seen = 0;
        let reports = run(source, options, 3, Duration::ZERO, |_| {
            seen += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, 3);
        assert_eq!(reports[0].new, 3);
        assert_eq!(reports[1].unchanged, 3);
        assert_eq!(reports[2].unchanged, 3);
        assert!(reports.iter().all(|r| r.changed.is_empty()));
    }

    #[test]
    fn test_run_rejects_invalid_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.dmp");
        fs::write(&path, vec![0u8; 0x100]).unwrap();

        let source = DumpFile::open(&path, 0).unwrap();
        let options = ScanOptions {
            chunk_size: -1,
            ..ScanOptions::default()
        };
        assert!(run(source, options, 1, Duration::ZERO, |_| Ok(())).is_err());
    }

    #[test]
    fn test_print_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.dmp");
        fs::write(&path, vec![1u8; 0x40]).unwrap();

        let source = DumpFile::open(&path, 0).unwrap();
        let options = ScanOptions {
            chunk_size: 0x10,
            ..ScanOptions::default()
        };
        let reports = run(source, options, 1, Duration::ZERO, |report| {
            print_report(report, true)
        })
        .unwrap();
        assert_eq!(reports[0].chunks, 4);
    }
}
