//! Store inspection command.

use pagedb_core::{Journal, Manifest, RecordStore};
use pagedb_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// Store statistics and metadata.
///
/// Gathered by reading the store files directly, without taking the
/// store lock, so a store held open by another process can still be
/// inspected.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    pub store_path: String,
    pub format_version: Option<String>,
    pub last_checkpoint: Option<u64>,
    pub journal_size: u64,
    pub journal_records: usize,
    pub record_file_size: u64,
    pub versions: usize,
    pub live_pages: usize,
    pub tombstoned_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<String>>,
}

/// Runs the inspect command.
pub fn run(store_path: &Path, list_pages: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !store_path.is_dir() {
        return Err(format!("store directory does not exist: {}", store_path.display()).into());
    }

    let manifest = read_manifest(store_path)?;
    let (journal_size, journal_records) = scan_journal(store_path)?;

    let mut result = InspectResult {
        store_path: store_path.display().to_string(),
        format_version: manifest
            .as_ref()
            .map(|m| format!("{}.{}", m.format_version.0, m.format_version.1)),
        last_checkpoint: manifest
            .as_ref()
            .and_then(|m| m.last_checkpoint)
            .map(|id| id.as_u64()),
        journal_size,
        journal_records,
        record_file_size: 0,
        versions: 0,
        live_pages: 0,
        tombstoned_pages: 0,
        pages: None,
    };

    let records_path = store_path.join("pages.dat");
    if records_path.exists() {
        let store = RecordStore::new(Box::new(FileBackend::open(&records_path)?));
        let scan = store.rebuild()?;
        result.record_file_size = store.size()?;
        result.versions = scan.record_count;

        let mut live: Vec<String> = scan
            .latest
            .iter()
            .filter(|(_, (_, tombstone))| !tombstone)
            .map(|(path, _)| path.as_str().to_string())
            .collect();
        live.sort();
        result.live_pages = live.len();
        result.tombstoned_pages = scan.latest.len() - live.len();
        if list_pages {
            result.pages = Some(live);
        }
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }

    Ok(())
}

fn read_manifest(store_path: &Path) -> Result<Option<Manifest>, Box<dyn std::error::Error>> {
    let manifest_path = store_path.join("MANIFEST");
    if !manifest_path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(&manifest_path)?;
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(Manifest::decode(&data)?))
}

fn scan_journal(store_path: &Path) -> Result<(u64, usize), Box<dyn std::error::Error>> {
    let journal_path = store_path.join("journal.log");
    if !journal_path.exists() {
        return Ok((0, 0));
    }
    let journal = Journal::new(Box::new(FileBackend::open(&journal_path)?));
    let size = journal.size()?;
    let count = journal.read_all()?.len();
    Ok((size, count))
}

fn print_text(result: &InspectResult) {
    println!("PageDB Store Inspection");
    println!("=======================");
    println!("Path:            {}", result.store_path);
    println!(
        "Format version:  {}",
        result.format_version.as_deref().unwrap_or("(none)")
    );
    match result.last_checkpoint {
        Some(id) => println!("Last checkpoint: version {id}"),
        None => println!("Last checkpoint: (never)"),
    }
    println!();
    println!(
        "Journal:         {} ({} records)",
        format_size(result.journal_size),
        result.journal_records
    );
    println!("Record file:     {}", format_size(result.record_file_size));
    println!("Versions:        {}", result.versions);
    println!("Live pages:      {}", result.live_pages);
    println!("Tombstoned:      {}", result.tombstoned_pages);

    if let Some(pages) = &result.pages {
        println!();
        println!("Live pages:");
        for page in pages {
            println!("  {page}");
        }
    }
}

/// Formats a byte count with a binary unit suffix.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
