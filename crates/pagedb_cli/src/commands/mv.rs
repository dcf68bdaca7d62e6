//! Page move command.

use pagedb_core::{PageEngine, PagePath, VersionId};
use std::path::Path;

/// Runs the mv command.
pub fn run(
    store_path: &Path,
    source: &str,
    destination: &str,
    message: &str,
    base: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = PageEngine::open(store_path)?;
    let source = PagePath::new(source);
    let mut txn = engine.begin()?;

    let mut handle = match base {
        Some(base) => txn.open_at(source, VersionId::new(base))?,
        None => txn.open(source)?,
    };
    handle.move_to(PagePath::new(destination))?;
    txn.stage(handle)?;

    for record in &txn.commit(message)? {
        if record.is_tombstone() {
            println!("committed {} at {} (redirect)", record.id, record.path);
        } else {
            println!("committed {} at {}", record.id, record.path);
        }
    }
    Ok(())
}
