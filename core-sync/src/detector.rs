//! # Change Detector
//!
//! Decides whether a remote file has to be fetched by comparing it with the
//! local copy.

use bridge_traits::error::Result;
use bridge_traits::storage::{FileMetadata, FileSystemAccess, RemoteFile};
use std::path::Path;
use std::sync::Arc;

/// Local state of a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Nothing exists at the local path
    Missing,
    /// The remote copy was modified after the local one
    Stale,
    Current,
}

impl ChangeStatus {
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, ChangeStatus::Current)
    }
}

/// Classify against already-read local metadata.
///
/// A remote file without a modification time is never considered newer.
/// Equal timestamps count as current.
pub fn classify_metadata(remote: &RemoteFile, local: Option<&FileMetadata>) -> ChangeStatus {
    let Some(local) = local else {
        return ChangeStatus::Missing;
    };

    match (remote.modified_at, local.modified_at) {
        (Some(remote_time), Some(local_time)) if remote_time > local_time => ChangeStatus::Stale,
        _ => ChangeStatus::Current,
    }
}

/// Compares remote files with their local copies.
pub struct ChangeDetector {
    fs: Arc<dyn FileSystemAccess>,
}

impl ChangeDetector {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }

    pub async fn classify(&self, remote: &RemoteFile, local_path: &Path) -> Result<ChangeStatus> {
        let local = self.fs.try_metadata(local_path).await?;
        Ok(classify_metadata(remote, local.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn remote(modified: Option<DateTime<Utc>>) -> RemoteFile {
        RemoteFile {
            id: "id".to_string(),
            name: "a.mp4".to_string(),
            mime_type: Some("video/mp4".to_string()),
            size: Some(10),
            modified_at: modified,
            is_folder: false,
        }
    }

    fn local(modified: DateTime<Utc>) -> FileMetadata {
        FileMetadata {
            size: 10,
            modified_at: Some(modified),
            is_directory: false,
        }
    }

    #[test]
    fn test_missing_when_no_local_file() {
        assert_eq!(
            classify_metadata(&remote(Some(at(2))), None),
            ChangeStatus::Missing
        );
    }

    #[test]
    fn test_stale_when_remote_newer() {
        let status = classify_metadata(&remote(Some(at(3))), Some(&local(at(2))));
        assert_eq!(status, ChangeStatus::Stale);
        assert!(status.needs_fetch());
    }

    #[test]
    fn test_current_when_equal_or_older() {
        assert_eq!(
            classify_metadata(&remote(Some(at(2))), Some(&local(at(2)))),
            ChangeStatus::Current
        );
        assert_eq!(
            classify_metadata(&remote(Some(at(1))), Some(&local(at(2)))),
            ChangeStatus::Current
        );
        assert!(!ChangeStatus::Current.needs_fetch());
    }

    #[test]
    fn test_current_without_remote_time() {
        assert_eq!(
            classify_metadata(&remote(None), Some(&local(at(2)))),
            ChangeStatus::Current
        );
    }
}
