//! Item inspector
//!
//! Builds descriptors from a fresh `stat` of the physical entry. Nothing here
//! mutates the filesystem, so these functions are safe to call speculatively.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fs::Metadata;
use std::io;
use tokio::fs;

use super::path::{LogicalPath, Root};
use crate::http::mime::{self, DIRECTORY_MIME};
use crate::logger;

/// Snapshot of one filesystem entry as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub path: LogicalPath,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub size: u64,
    #[serde(rename = "updatedAt", serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ItemInfo {
    fn from_metadata(path: LogicalPath, metadata: &Metadata) -> Self {
        let (kind, size) = if metadata.is_dir() {
            (DIRECTORY_MIME, 0)
        } else {
            let ext = path.extension();
            (mime::get_content_type(ext.as_deref()), metadata.len())
        };

        Self {
            path,
            kind,
            size,
            updated_at: changed_at(metadata),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == DIRECTORY_MIME
    }
}

/// Resolve the descriptor for a logical path
///
/// Returns `Ok(None)` when nothing exists there (including when an ancestor is
/// a regular file). Other stat failures propagate.
pub async fn inspect(root: &Root, path: &LogicalPath) -> io::Result<Option<ItemInfo>> {
    let physical = root.physical(path);
    match fs::metadata(&physical).await {
        Ok(metadata) => Ok(Some(ItemInfo::from_metadata(path.clone(), &metadata))),
        Err(e) if is_absent(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Descriptors of the direct children of a directory, in enumeration order
///
/// Entries that disappear between enumeration and stat are skipped.
pub async fn list_children(root: &Root, dir: &LogicalPath) -> io::Result<Vec<ItemInfo>> {
    let mut entries = fs::read_dir(root.physical(dir)).await?;
    let mut children = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            logger::log_debug(&format!(
                "Skipping non UTF-8 entry under {dir}: {}",
                name.to_string_lossy()
            ));
            continue;
        };
        if let Some(info) = inspect(root, &dir.join(name)).await? {
            children.push(info);
        }
    }

    Ok(children)
}

/// Whether an I/O error just means "no such entry"
pub fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[cfg(unix)]
fn changed_at(metadata: &Metadata) -> DateTime<Utc> {
    use std::os::unix::fs::MetadataExt;

    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
    DateTime::from_timestamp(metadata.ctime(), nanos).unwrap_or_default()
}

#[cfg(not(unix))]
fn changed_at(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default()
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
