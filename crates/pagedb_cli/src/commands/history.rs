//! Page history command.

use pagedb_core::{Config, PageEngine, PagePath};
use std::path::Path;

/// Runs the history command.
///
/// Lists versions newest first, following predecessor links across
/// renames, so entries may carry a different path than the one asked
/// for.
pub fn run(
    store_path: &Path,
    page: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = PageEngine::open_with_config(store_path, Config::new().create_if_missing(false))?;
    let path = PagePath::new(page);

    let mut shown = 0;
    for item in engine.history(&path)? {
        if let Some(limit) = limit {
            if shown >= limit {
                break;
            }
        }
        let record = item?;

        let mut line = format!(
            "{:<6} {:<17} {:<14} {}",
            record.id, record.kind, record.timestamp, record.message
        );
        if record.path != path {
            line.push_str(&format!("  (as {})", record.path));
        }
        if let Some(redirect) = &record.redirect {
            line.push_str(&format!("  -> {redirect}"));
        }
        println!("{line}");
        shown += 1;
    }

    if shown == 0 {
        return Err(format!("page not found: {path}").into());
    }
    Ok(())
}
