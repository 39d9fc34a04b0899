//! Item verb handlers
//!
//! One function per HTTP verb. Each takes the served root, the normalized
//! logical path and the already-parsed request inputs, and returns either a
//! [`Reply`] / descriptor or an [`FsApiError`] for the router to render.

use std::io;
use std::path::Path;
use tokio::fs;

use crate::error::{FsApiError, Result};
use crate::fs::{inspect, item, list_children, ops, ItemInfo, LogicalPath, Root};
use crate::http::mime::DIRECTORY_MIME;
use crate::http::{FormData, QueryFlags};

/// Form field naming the content of a created or replaced file
const CONTENT_FIELD: &str = "content";
/// Form field carrying the media type of a created item
const TYPE_FIELD: &str = "type";
/// Form field carrying the destination of a move
const PATH_FIELD: &str = "path";

/// What a successful GET produces
#[derive(Debug)]
pub enum Reply {
    Item(ItemInfo),
    Children(Vec<ItemInfo>),
    Download { info: ItemInfo, file: fs::File },
}

/// GET: descriptor, child listing or file download
pub async fn get_item(root: &Root, path: &LogicalPath, flags: QueryFlags) -> Result<Reply> {
    let info = inspect(root, path).await?.ok_or(FsApiError::NotFound)?;

    if flags.children {
        if !info.is_dir() {
            return Ok(Reply::Children(Vec::new()));
        }
        let children = list_children(root, &info.path).await?;
        return Ok(Reply::Children(children));
    }

    if flags.download {
        if info.is_dir() {
            return Err(FsApiError::NotFound);
        }
        let file = match fs::File::open(root.physical(&info.path)).await {
            Ok(f) => f,
            Err(e) if item::is_absent(&e) => return Err(FsApiError::NotFound),
            Err(e) => return Err(e.into()),
        };
        return Ok(Reply::Download { info, file });
    }

    Ok(Reply::Item(info))
}

/// POST: create a directory or file, never replacing an existing entry
pub async fn create_item(root: &Root, path: &LogicalPath, form: &FormData) -> Result<ItemInfo> {
    let physical = root.physical(path);
    if ops::exists(&physical).await? {
        return Err(FsApiError::ItemExists);
    }

    create_entry(&physical, form).await?;
    inspect(root, path).await?.ok_or(FsApiError::NotFound)
}

/// Exclusive create at `physical`; an entry that appeared after the existence
/// check is still a conflict
async fn create_entry(physical: &Path, form: &FormData) -> Result<()> {
    let created = if form.text(TYPE_FIELD) == Some(DIRECTORY_MIME) {
        ops::create_dir_exclusive(physical).await
    } else {
        ops::create_file_exclusive(physical, form.content(CONTENT_FIELD)).await
    };

    created.map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => FsApiError::ItemExists,
        _ => e.into(),
    })
}

/// PATCH: move the item and/or replace its content
pub async fn update_item(root: &Root, path: &LogicalPath, form: &FormData) -> Result<ItemInfo> {
    let mut current = path.clone();
    let mut physical = root.physical(&current);
    if !ops::exists(&physical).await? {
        return Err(FsApiError::NotFound);
    }

    let next = form.text(PATH_FIELD).map(LogicalPath::normalize);
    let content = form.content(CONTENT_FIELD);
    if current.is_root() && (next.is_some() || content.is_some()) {
        return Err(FsApiError::BadRequest("the root cannot be moved or replaced".to_string()));
    }

    if let Some(next) = next {
        if next != current {
            let next_physical = root.physical(&next);
            ops::move_entry(&physical, &next_physical).await?;
            current = next;
            physical = next_physical;
        }
    }

    if let Some(content) = content {
        ops::replace_content(&physical, content).await?;
    }

    inspect(root, &current).await?.ok_or(FsApiError::NotFound)
}

/// DELETE: remove recursively and return the descriptor as it was
pub async fn delete_item(root: &Root, path: &LogicalPath) -> Result<ItemInfo> {
    let info = inspect(root, path).await?.ok_or(FsApiError::NotFound)?;
    if info.path.is_root() {
        return Err(FsApiError::BadRequest("the root cannot be deleted".to_string()));
    }

    ops::remove_entry(&root.physical(&info.path)).await?;
    Ok(info)
}
