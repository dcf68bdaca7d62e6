//! Page delete command.

use pagedb_core::{PageEngine, PagePath, VersionId};
use std::path::Path;

/// Runs the rm command.
///
/// Deletes the page at its path; history stays resolvable by version
/// id afterwards.
pub fn run(
    store_path: &Path,
    page: &str,
    message: &str,
    base: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = PageEngine::open(store_path)?;
    let path = PagePath::new(page);
    let mut txn = engine.begin()?;

    let mut handle = match base {
        Some(base) => txn.open_at(path, VersionId::new(base))?,
        None => txn.open(path)?,
    };
    handle.delete()?;
    txn.stage(handle)?;

    for record in &txn.commit(message)? {
        println!("committed {} at {}", record.id, record.path);
    }
    Ok(())
}
