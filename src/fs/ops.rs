//! Filesystem mutation primitives used by the verb handlers

use std::io;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::item::is_absent;
use crate::http::Content;

/// Whether anything (including a dangling symlink) occupies `physical`
pub async fn exists(physical: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(physical).await {
        Ok(_) => Ok(true),
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create every missing ancestor of `physical`
pub async fn ensure_parent(physical: &Path) -> io::Result<()> {
    match physical.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Create a directory and its ancestors, failing with `AlreadyExists` if the leaf exists
pub async fn create_dir_exclusive(physical: &Path) -> io::Result<()> {
    ensure_parent(physical).await?;
    fs::create_dir(physical).await
}

/// Create a new file, empty when `content` is `None`, failing with `AlreadyExists` if
/// anything is there
pub async fn create_file_exclusive(physical: &Path, content: Option<Content<'_>>) -> io::Result<()> {
    ensure_parent(physical).await?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(physical)
        .await?;
    match content {
        Some(content) => content.write_to(&mut file).await.map(|_| ()),
        None => file.flush().await,
    }
}

/// Remove a file or a whole directory tree
pub async fn remove_entry(physical: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(physical).await?;
    if metadata.is_dir() {
        fs::remove_dir_all(physical).await
    } else {
        fs::remove_file(physical).await
    }
}

/// Replace whatever is at `physical` with a file holding `content`
pub async fn replace_content(physical: &Path, content: Content<'_>) -> io::Result<()> {
    remove_entry(physical).await?;
    let mut file = fs::File::create(physical).await?;
    content.write_to(&mut file).await.map(|_| ())
}

/// Move an entry, creating the destination's parent chain first
pub async fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    ensure_parent(to).await?;
    fs::rename(from, to).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_file_exclusive_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b/c.txt");

        create_file_exclusive(&target, Some(Content::Text("first"))).await.unwrap();
        let err = create_file_exclusive(&target, Some(Content::Text("second"))).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&target).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_create_file_exclusive_without_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("empty.dat");

        create_file_exclusive(&target, None).await.unwrap();

        assert!(target.is_file());
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_create_dir_exclusive() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x/y/z");

        create_dir_exclusive(&target).await.unwrap();
        assert!(target.is_dir());
        let err = create_dir_exclusive(&target).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_remove_entry_recursive() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("tree");
        std::fs::create_dir_all(tree.join("deep/er")).unwrap();
        std::fs::write(tree.join("deep/er/f.txt"), b"x").unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"y").unwrap();

        remove_entry(&tree).await.unwrap();
        remove_entry(&file).await.unwrap();

        assert!(!tree.exists());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_replace_content_over_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("thing");
        std::fs::create_dir_all(target.join("inner")).unwrap();

        replace_content(&target, Content::Text("now a file")).await.unwrap();

        assert!(target.is_file());
        assert_eq!(std::fs::read(&target).unwrap(), b"now a file");
    }

    #[tokio::test]
    async fn test_move_entry_creates_parent() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.txt");
        let to = dir.path().join("new/home/b.txt");
        std::fs::write(&from, b"payload").unwrap();

        move_entry(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"payload");
    }
}
