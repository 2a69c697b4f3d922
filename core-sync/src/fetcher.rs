//! # Fetcher
//!
//! Streams remote files into the videos directory.
//!
//! Content is written to `<name>.part` next to the target and renamed into
//! place only after the stream completed and the byte count matched the size
//! reported by the provider. Readers of the videos directory never see a torn
//! file under its final name.

use crate::error::{Result, SyncError};
use bridge_traits::storage::{FileSystemAccess, RemoteFile, StorageProvider};
use core_runtime::logging::strip_path;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Downloads remote files, one at a time per call.
pub struct Fetcher {
    provider: Arc<dyn StorageProvider>,
    fs: Arc<dyn FileSystemAccess>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        fs: Arc<dyn FileSystemAccess>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            fs,
            timeout,
        }
    }

    /// Temporary path used while `target` is being written.
    pub fn partial_path(target: &Path) -> PathBuf {
        let mut name: OsString = target.file_name().map(OsString::from).unwrap_or_default();
        name.push(".part");
        target.with_file_name(name)
    }

    /// Download `remote` to `target`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Every failure, including the timeout, is reported as
    /// [`SyncError::Download`] and leaves no `.part` file behind.
    #[instrument(skip(self, remote, target), fields(file = %remote.name))]
    pub async fn fetch(&self, remote: &RemoteFile, target: &Path) -> Result<u64> {
        let partial = Self::partial_path(target);

        let outcome = tokio::time::timeout(self.timeout, self.stream_to(remote, &partial)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(SyncError::download(
                &remote.name,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        };

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                self.discard(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = self.fs.rename(&partial, target).await {
            self.discard(&partial).await;
            return Err(SyncError::download(&remote.name, e));
        }

        debug!(bytes = written, "Download complete");
        Ok(written)
    }

    async fn stream_to(&self, remote: &RemoteFile, partial: &Path) -> Result<u64> {
        let mut reader = self
            .provider
            .download_stream(&remote.id)
            .await
            .map_err(|e| SyncError::download(&remote.name, e))?;

        let mut writer = self
            .fs
            .open_write_stream(partial)
            .await
            .map_err(|e| SyncError::download(&remote.name, e))?;

        let written = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| SyncError::download(&remote.name, e))?;
        writer
            .shutdown()
            .await
            .map_err(|e| SyncError::download(&remote.name, e))?;

        if let Some(expected) = remote.size {
            if expected != written {
                return Err(SyncError::download(
                    &remote.name,
                    format!("expected {} bytes, received {}", expected, written),
                ));
            }
        }

        Ok(written)
    }

    async fn discard(&self, partial: &Path) {
        if let Err(e) = self.fs.delete_file(partial).await {
            if !e.is_not_found() {
                warn!(
                    partial = %strip_path(&partial.to_string_lossy()),
                    error = %e,
                    "Failed to remove partial download"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            Fetcher::partial_path(Path::new("/g/videos/a b.mp4")),
            PathBuf::from("/g/videos/a b.mp4.part")
        );
    }
}
