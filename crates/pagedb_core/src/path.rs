//! Normalized page paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized, `/`-delimited page path.
///
/// Normalization is infallible: repeated slashes collapse, `.` segments
/// drop, `..` segments resolve against what precedes them and clamp at the
/// root. The root is the empty path and displays as `/`; every other path
/// is stored without leading or trailing slashes.
///
/// `PagePath` is cheap to clone and usable as an index key.
///
/// # Example
///
/// ```rust
/// use pagedb_core::PagePath;
///
/// let path = PagePath::new("/wiki//notes/../home/");
/// assert_eq!(path.as_str(), "wiki/home");
/// assert_eq!(path.name(), Some("home"));
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub struct PagePath(String);

impl PagePath {
    /// Creates a path from raw caller input, normalizing it.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.as_ref().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self(segments.join("/"))
    }

    /// The root path.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Normalized path string, empty for the root.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last path segment, `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            Some(self.0.rsplit('/').next().unwrap_or(&self.0))
        }
    }

    /// Parent path, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Some(Self(parent.to_string())),
            None => Some(Self::root()),
        }
    }

    /// Extension of the last segment, without the dot.
    ///
    /// `None` when the name has no dot, starts with its only dot, or ends
    /// with a dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.name()?;
        match name.rsplit_once('.') {
            Some(("", _)) | Some((_, "")) => None,
            Some((_, ext)) => Some(ext),
            None => None,
        }
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for PagePath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for PagePath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<PagePath> for String {
    fn from(path: PagePath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_slashes_and_dots() {
        assert_eq!(PagePath::new("a//b/./c").as_str(), "a/b/c");
        assert_eq!(PagePath::new("/a/b/").as_str(), "a/b");
        assert_eq!(PagePath::new("./a").as_str(), "a");
    }

    #[test]
    fn resolves_parent_segments() {
        assert_eq!(PagePath::new("a/b/../c").as_str(), "a/c");
        assert_eq!(PagePath::new("a/../../b").as_str(), "b");
        assert_eq!(PagePath::new("../..").as_str(), "");
    }

    #[test]
    fn root_forms() {
        for raw in ["", "/", "//", ".", "/./"] {
            let path = PagePath::new(raw);
            assert!(path.is_root(), "{raw:?} should normalize to root");
            assert_eq!(path, PagePath::root());
        }
        assert_eq!(PagePath::root().to_string(), "/");
    }

    #[test]
    fn name_and_parent() {
        let path = PagePath::new("wiki/notes/today.md");
        assert_eq!(path.name(), Some("today.md"));
        assert_eq!(path.parent(), Some(PagePath::new("wiki/notes")));

        let top = PagePath::new("single");
        assert_eq!(top.parent(), Some(PagePath::root()));
        assert_eq!(PagePath::root().parent(), None);
        assert_eq!(PagePath::root().name(), None);
    }

    #[test]
    fn extension_rules() {
        assert_eq!(PagePath::new("a/b.md").extension(), Some("md"));
        assert_eq!(PagePath::new("a/archive.tar.gz").extension(), Some("gz"));
        assert_eq!(PagePath::new("a/plain").extension(), None);
        assert_eq!(PagePath::new("a/.hidden").extension(), None);
        assert_eq!(PagePath::new("a/trailing.").extension(), None);
    }

    #[test]
    fn display_round_trip_for_non_root() {
        let path = PagePath::new("wiki/home");
        assert_eq!(path.to_string(), "wiki/home");
        assert_eq!(PagePath::new(path.to_string()), path);
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[a-z./]{0,40}") {
            let once = PagePath::new(&raw);
            let twice = PagePath::new(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalized_has_no_special_segments(raw in "[a-z./]{0,40}") {
            let path = PagePath::new(&raw);
            for segment in path.as_str().split('/') {
                if !path.is_root() {
                    prop_assert!(!segment.is_empty());
                    prop_assert_ne!(segment, ".");
                    prop_assert_ne!(segment, "..");
                }
            }
        }
    }
}
