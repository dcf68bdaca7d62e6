//! Page display command.

use pagedb_core::{Config, PageEngine, PagePath, VersionId, VersionRecord};
use std::io::Write;
use std::path::Path;

/// Runs the show command.
///
/// Prints the page's content bytes to stdout, or its metadata with
/// `--meta`. A deleted page still shows with an explicit `--version`.
pub fn run(
    store_path: &Path,
    page: &str,
    version: Option<u64>,
    meta: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = PageEngine::open_with_config(store_path, Config::new().create_if_missing(false))?;
    let path = PagePath::new(page);

    let record = match version {
        Some(id) => engine.resolve_version(&path, VersionId::new(id))?,
        None => engine.resolve(&path)?,
    };
    let Some(record) = record else {
        return Err(match version {
            Some(id) => format!("no version {id} of page: {}", path.as_str()).into(),
            None => format!("page not found: {}", path.as_str()).into(),
        });
    };

    if meta {
        print_meta(&record);
    } else {
        std::io::stdout().write_all(&record.content.data)?;
    }

    Ok(())
}

fn print_meta(record: &VersionRecord) {
    println!("Path:        {}", record.path.as_str());
    println!("Version:     {}", record.id);
    println!("Kind:        {}", record.kind);
    println!("Timestamp:   {}", record.timestamp);
    println!("Message:     {}", record.message);
    println!("MIME:        {}", record.content.mime);
    println!("Size:        {} bytes", record.content.len());
    match record.predecessor {
        Some(id) => println!("Predecessor: {id}"),
        None => println!("Predecessor: (none)"),
    }
    if let Some(redirect) = &record.redirect {
        println!("Redirect:    {}", redirect.as_str());
    }
    println!("Cache token: {}", record.cache_token());

    if !record.attributes.is_empty() {
        println!("Attributes:");
        for (key, value) in &record.attributes {
            println!("  {key} = {value}");
        }
    }
}
