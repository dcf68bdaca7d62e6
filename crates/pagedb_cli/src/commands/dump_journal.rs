//! Commit journal dump command.

use pagedb_core::{Journal, JournalRecord, StoredRecord};
use pagedb_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// One journal frame, decoded for display.
#[derive(Debug, Serialize)]
pub struct JournalEntry {
    pub offset: u64,
    pub record: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tombstone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_version: Option<u64>,
}

#[derive(Debug, Serialize)]
struct DumpResult {
    entries: Vec<JournalEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    torn_tail_bytes: Option<u64>,
}

/// Runs the dump-journal command.
pub fn run(
    store_path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let journal_path = store_path.join("journal.log");
    if !journal_path.exists() {
        return Err(format!("no journal at {}", journal_path.display()).into());
    }

    let journal = Journal::new(Box::new(FileBackend::open(&journal_path)?));
    let mut iter = journal.iter()?;
    let mut entries = Vec::new();
    let mut failure = None;

    for item in iter.by_ref() {
        if let Some(limit) = limit {
            if entries.len() >= limit {
                break;
            }
        }
        match item {
            Ok((offset, record)) => entries.push(describe(offset, &record)),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    let torn = iter.size() - iter.offset();
    let result = DumpResult {
        entries,
        torn_tail_bytes: (torn > 0 && failure.is_none() && limit.is_none()).then_some(torn),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }

    match failure {
        Some(err) => Err(format!("journal corrupt at offset {}: {err}", iter.offset()).into()),
        None => Ok(()),
    }
}

fn describe(offset: u64, record: &JournalRecord) -> JournalEntry {
    let mut entry = JournalEntry {
        offset,
        record: "",
        txn: record.txn().map(|t| t.as_u64()),
        version: None,
        page: None,
        tombstone: None,
        body_size: None,
        last_version: None,
    };

    match record {
        JournalRecord::Begin { .. } => entry.record = "begin",
        JournalRecord::Commit { .. } => entry.record = "commit",
        JournalRecord::Version { body, .. } => {
            entry.record = "version";
            entry.body_size = Some(body.len());
            // Best effort; a frame the store itself rejects still dumps.
            if let Ok(frame) = StoredRecord::decode(body) {
                entry.version = Some(frame.version_id.as_u64());
                entry.page = Some(frame.path.as_str().to_string());
                entry.tombstone = Some(frame.is_tombstone());
            }
        }
        JournalRecord::Checkpoint { last_version } => {
            entry.record = "checkpoint";
            entry.last_version = last_version.map(|v| v.as_u64());
        }
    }

    entry
}

fn print_text(result: &DumpResult) {
    for entry in &result.entries {
        let mut line = format!("[{:>10}] {:<10}", entry.offset, entry.record);
        if let Some(txn) = entry.txn {
            line.push_str(&format!(" txn={txn}"));
        }
        if let Some(version) = entry.version {
            line.push_str(&format!(" version={version}"));
        }
        if let Some(page) = &entry.page {
            line.push_str(&format!(" page={page}"));
        }
        if entry.tombstone == Some(true) {
            line.push_str(" tombstone");
        }
        if let Some(size) = entry.body_size {
            line.push_str(&format!(" body={size}B"));
        }
        if let Some(last) = entry.last_version {
            line.push_str(&format!(" last_version={last}"));
        }
        println!("{line}");
    }

    println!("{} records", result.entries.len());
    if let Some(torn) = result.torn_tail_bytes {
        println!("torn tail: {torn} bytes");
    }
}
