//! Store integrity verification command.

use pagedb_core::{Journal, StoredRecord};
use pagedb_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// Outcome of checking one store file.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub target: String,
    pub frames_checked: usize,
    pub valid_frames: usize,
    pub errors: Vec<String>,
}

impl CheckReport {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            frames_checked: 0,
            valid_frames: 0,
            errors: Vec::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
///
/// Walks every frame of the selected store files, checking framing and
/// checksums. Exits nonzero when corruption is found.
pub fn run(
    store_path: &Path,
    check_journal: bool,
    check_records: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !store_path.is_dir() {
        return Err(format!("store directory does not exist: {}", store_path.display()).into());
    }

    let mut reports = Vec::new();
    if check_journal {
        reports.push(verify_journal(&store_path.join("journal.log"))?);
    }
    if check_records {
        reports.push(verify_records(&store_path.join("pages.dat"))?);
    }

    let mut all_ok = true;
    for report in &reports {
        println!(
            "{}: {}/{} frames valid",
            report.target, report.valid_frames, report.frames_checked
        );
        for error in &report.errors {
            println!("  error: {error}");
            all_ok = false;
        }
    }

    if all_ok {
        println!("verification passed");
        Ok(())
    } else {
        println!("verification FAILED");
        std::process::exit(1);
    }
}

/// Walks journal frames through the streaming reader.
///
/// A torn tail is listed as an error: it means the store crashed and
/// has not been reopened since, so the journal still needs recovery.
fn verify_journal(path: &Path) -> Result<CheckReport, Box<dyn std::error::Error>> {
    let mut report = CheckReport::new("journal");
    if !path.exists() {
        return Ok(report);
    }

    let journal = Journal::new(Box::new(FileBackend::open(path)?));
    let mut iter = journal.iter()?;
    for item in iter.by_ref() {
        report.frames_checked += 1;
        match item {
            Ok(_) => report.valid_frames += 1,
            Err(err) => {
                report.errors.push(err.to_string());
                break;
            }
        }
    }

    if iter.offset() < iter.size() && report.is_ok() {
        report.errors.push(format!(
            "torn frame tail: {} trailing bytes at offset {} (dropped at next open)",
            iter.size() - iter.offset(),
            iter.offset()
        ));
    }

    Ok(report)
}

/// Walks record frames by their length prefixes, decoding each one.
///
/// Stops at the first bad frame; the length chain is untrustworthy
/// past that point.
fn verify_records(path: &Path) -> Result<CheckReport, Box<dyn std::error::Error>> {
    let mut report = CheckReport::new("records");
    if !path.exists() {
        return Ok(report);
    }

    let backend = FileBackend::open(path)?;
    let size = backend.size()?;
    let mut offset = 0u64;

    while offset < size {
        if offset + 4 > size {
            report.errors.push(format!(
                "torn frame header at offset {offset}: {} trailing bytes",
                size - offset
            ));
            break;
        }

        let len_bytes = backend.read_at(offset, 4)?;
        let record_len =
            u64::from(u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]));
        if offset + record_len > size {
            report.frames_checked += 1;
            report.errors.push(format!(
                "torn frame at offset {offset}: wants {record_len} bytes, {} remain",
                size - offset
            ));
            break;
        }

        report.frames_checked += 1;
        let data = backend.read_at(offset, record_len as usize)?;
        match StoredRecord::decode(&data) {
            Ok(_) => report.valid_frames += 1,
            Err(err) => {
                report.errors.push(format!("frame at offset {offset}: {err}"));
                break;
            }
        }

        offset += record_len;
    }

    Ok(report)
}
