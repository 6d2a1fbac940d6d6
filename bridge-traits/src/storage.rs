//! File System Abstraction
//!
//! The mirror only ever inspects and creates directories under the download
//! root; it never reads or writes audio files itself. That is the download
//! tool's job.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn count_files(fs: &dyn FileSystemAccess, dir: &Path) -> Result<usize> {
///     match fs.list_files(dir).await {
///         Ok(files) => Ok(files.len()),
///         Err(e) if e.is_not_found() => Ok(0),
///         Err(e) => Err(e),
///     }
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get file metadata
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// List the direct children of a directory (non-recursive)
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// List the non-directory entries directly inside a directory
    ///
    /// Entries removed between listing and inspection are skipped.
    async fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in self.list_directory(path).await? {
            match self.metadata(&entry).await {
                Ok(metadata) if !metadata.is_directory => files.push(entry),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(files)
    }
}
