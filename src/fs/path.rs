//! Logical path normalization
//!
//! Clients address items with `/`-separated paths anchored at the served root.
//! Normalization happens before any filesystem call, so a logical path can never
//! climb above the root no matter how many `..` segments it carries.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Root-anchored, normalized logical path (`/`, `/a`, `/a/b.txt`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LogicalPath(String);

impl LogicalPath {
    /// The root itself
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize an arbitrary client path
    ///
    /// Empty, `.` segments and repeated separators are dropped; `..` pops one
    /// segment and is a no-op at the root.
    ///
    /// # Examples
    /// ```
    /// use fsapi::fs::LogicalPath;
    /// assert_eq!(LogicalPath::normalize("a//b/./c/..").as_str(), "/a/b");
    /// assert_eq!(LogicalPath::normalize("../../etc/passwd").as_str(), "/etc/passwd");
    /// assert_eq!(LogicalPath::normalize("").as_str(), "/");
    /// ```
    pub fn normalize(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        Self(format!("/{}", segments.join("/")))
    }

    /// Append a child name, normalizing the result
    pub fn join(&self, child: &str) -> Self {
        Self::normalize(&format!("{}/{child}", self.0))
    }

    /// Final segment, `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Lowercased extension of the final segment
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory tree being served
///
/// Built once at startup from the configured root and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root(PathBuf);

impl Root {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Physical location of a logical path
    pub fn physical(&self, logical: &LogicalPath) -> PathBuf {
        let mut physical = self.0.clone();
        for segment in logical.segments() {
            physical.push(segment);
        }
        physical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prepends_slash() {
        assert_eq!(LogicalPath::normalize("cat.png").as_str(), "/cat.png");
        assert_eq!(LogicalPath::normalize("/cat.png").as_str(), "/cat.png");
    }

    #[test]
    fn test_normalize_collapses_segments() {
        assert_eq!(LogicalPath::normalize("/a//b/").as_str(), "/a/b");
        assert_eq!(LogicalPath::normalize("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(LogicalPath::normalize("///").as_str(), "/");
    }

    #[test]
    fn test_traversal_stays_at_root() {
        assert_eq!(LogicalPath::normalize("..").as_str(), "/");
        assert_eq!(
            LogicalPath::normalize("../../etc/passwd").as_str(),
            "/etc/passwd"
        );
        assert_eq!(LogicalPath::normalize("/a/../../..").as_str(), "/");
    }

    #[test]
    fn test_join() {
        let dir = LogicalPath::normalize("/docs");
        assert_eq!(dir.join("notes.txt").as_str(), "/docs/notes.txt");
        assert_eq!(LogicalPath::root().join("a").as_str(), "/a");
        assert_eq!(dir.join("../..").as_str(), "/");
    }

    #[test]
    fn test_extension() {
        assert_eq!(
            LogicalPath::normalize("/cat.PNG").extension().as_deref(),
            Some("png")
        );
        assert_eq!(
            LogicalPath::normalize("/a.tar.gz").extension().as_deref(),
            Some("gz")
        );
        assert_eq!(LogicalPath::normalize("/.bashrc").extension(), None);
        assert_eq!(LogicalPath::normalize("/README").extension(), None);
        assert_eq!(LogicalPath::root().extension(), None);
    }

    #[test]
    fn test_physical_stays_under_root() {
        let root = Root::new("/srv/files");
        let p = root.physical(&LogicalPath::normalize("../../etc/passwd"));
        assert_eq!(p, PathBuf::from("/srv/files/etc/passwd"));
        assert_eq!(root.physical(&LogicalPath::root()), PathBuf::from("/srv/files"));
    }
}
