//! Storage and File System Abstractions
//!
//! Provides the local file system trait used for videos, derived assets and
//! the manifest, plus the remote storage provider trait used to list and
//! download source videos.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Byte stream returned by streaming reads and downloads.
pub type ContentStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    /// Last modification time, with the full precision the platform reports
    pub modified_at: Option<DateTime<Utc>>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts the local storage the sync engine writes into. Paths are always
/// absolute or relative to the process working directory; the trait does not
/// impose a root.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn publish(fs: &dyn FileSystemAccess, data: &[u8]) -> Result<()> {
///     let tmp = Path::new("videos.json.tmp");
///     fs.write_file(tmp, data.to_vec().into()).await?;
///     fs.rename(tmp, Path::new("videos.json")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating or truncating it
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Rename a file, replacing the destination if it exists
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open a file for streaming writes, creating or truncating it
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>;

    /// Metadata for `path`, or `None` when nothing exists there
    async fn try_metadata(&self, path: &Path) -> Result<Option<FileMetadata>> {
        match self.metadata(path).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A file entry returned by a remote storage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-stable identifier
    pub id: String,
    /// File name, also used as the local file name
    pub name: String,
    pub mime_type: Option<String>,
    /// Size in bytes when the provider reports one
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_folder: bool,
}

impl RemoteFile {
    /// Lower-cased extension of `name`, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Remote storage provider trait
///
/// Implemented by cloud drive connectors. The sync engine only needs to
/// enumerate one folder and stream file contents.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List the direct children of `folder_id`
    ///
    /// Returns one page of entries plus the token for the next page, or
    /// `None` when the listing is complete.
    async fn list_folder(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)>;

    /// Open the content of `file_id` as a byte stream
    async fn download_stream(&self, file_id: &str) -> Result<ContentStream>;
}
