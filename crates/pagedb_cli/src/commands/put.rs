//! Page create/update command.

use pagedb_core::{PageEngine, PagePath, VersionId};
use std::io::Read;
use std::path::Path;

/// Runs the put command.
///
/// Creates the page when it does not exist, updates it otherwise.
/// With `--base` the update is checked against that version, so a
/// concurrent change since then fails instead of being overwritten.
pub fn run(
    store_path: &Path,
    page: &str,
    file: Option<&Path>,
    message: &str,
    base: Option<u64>,
    attrs: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let content = match file {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let mut pairs = Vec::with_capacity(attrs.len());
    for attr in attrs {
        let Some((key, value)) = attr.split_once('=') else {
            return Err(format!("attribute must be key=value: {attr}").into());
        };
        pairs.push((key.to_string(), value.to_string()));
    }

    let engine = PageEngine::open(store_path)?;
    let path = PagePath::new(page);
    let mut txn = engine.begin()?;

    let mut handle = if let Some(base) = base {
        txn.open_at(path.clone(), VersionId::new(base))?
    } else if engine.exists(&path)? {
        txn.open(path.clone())?
    } else {
        txn.create(path.clone())?
    };

    handle.set_content(content);
    handle.merge_attributes(pairs);
    txn.stage(handle)?;

    for record in &txn.commit(message)? {
        println!("committed {} at {}", record.id, record.path);
    }
    Ok(())
}
