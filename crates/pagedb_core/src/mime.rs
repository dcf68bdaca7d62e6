//! MIME type inference for page content.

use crate::path::PagePath;
use std::collections::BTreeMap;

/// Attribute key that overrides MIME inference.
pub const MIME_ATTRIBUTE: &str = "mime";

/// Fallback MIME type when nothing else matches.
pub const DEFAULT_MIME: &str = "text/plain";

/// Looks up the MIME type for a file extension.
///
/// Covers the extensions a wiki store actually sees; everything else
/// falls back to the configured default.
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "md" | "markdown" => "text/markdown",
        "creole" => "text/x-creole",
        "textile" => "text/x-textile",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => return None,
    };
    Some(mime)
}

/// Resolves the MIME type for a page.
///
/// Precedence: explicit `mime` attribute, then path extension, then the
/// configured default. Deterministic, so a page's MIME never depends on
/// edit order.
#[must_use]
pub fn resolve_mime(path: &PagePath, attributes: &BTreeMap<String, String>, default: &str) -> String {
    if let Some(explicit) = attributes.get(MIME_ATTRIBUTE) {
        return explicit.clone();
    }
    path.extension()
        .and_then(mime_for_extension)
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(mime_for_extension("md"), Some("text/markdown"));
        assert_eq!(mime_for_extension("png"), Some("image/png"));
        assert_eq!(mime_for_extension("exotic"), None);
    }

    #[test]
    fn attribute_wins_over_extension() {
        let path = PagePath::new("notes/today.md");
        let resolved = resolve_mime(&path, &attrs(&[("mime", "text/x-custom")]), DEFAULT_MIME);
        assert_eq!(resolved, "text/x-custom");
    }

    #[test]
    fn extension_wins_over_default() {
        let path = PagePath::new("notes/today.md");
        assert_eq!(resolve_mime(&path, &attrs(&[]), DEFAULT_MIME), "text/markdown");
    }

    #[test]
    fn default_for_unknown() {
        let path = PagePath::new("notes/today");
        assert_eq!(resolve_mime(&path, &attrs(&[]), "text/x-wiki"), "text/x-wiki");
    }
}
