//! # Remote Lister
//!
//! Enumerates the video files of one remote folder.
//!
//! The provider is paged until it stops returning a page token. Entries are
//! kept when they are not folders, carry a usable local file name, and are
//! recognised as video either by extension or by MIME type. The provider
//! orders results newest first, so when two entries share a name the most
//! recently modified one wins.

use crate::error::{Result, SyncError};
use bridge_traits::storage::{RemoteFile, StorageProvider};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Video extensions recognised locally and remotely, lower case, no dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Upper bound on pages fetched in one listing.
const MAX_PAGES: usize = 1000;

/// Whether `name` ends in one of [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn has_supported_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Whether a remote entry should be treated as a video.
pub fn is_video(file: &RemoteFile) -> bool {
    if file.is_folder {
        return false;
    }

    has_supported_extension(&file.name)
        || file
            .mime_type
            .as_deref()
            .map(|mime| mime.starts_with("video/"))
            .unwrap_or(false)
}

/// Whether `name` maps to exactly one file inside the videos directory.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Lists video files from a [`StorageProvider`] folder.
pub struct RemoteLister {
    provider: Arc<dyn StorageProvider>,
}

impl RemoteLister {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Fetch every page of `folder_id` and return the videos in listing order.
    ///
    /// # Errors
    ///
    /// Any provider failure is reported as [`SyncError::RemoteList`].
    #[instrument(skip(self))]
    pub async fn list(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            page_count += 1;
            debug!("Fetching page {} (token: {:?})", page_count, page_token);

            let (files, next_token) = self
                .provider
                .list_folder(folder_id, page_token.clone())
                .await
                .map_err(|e| SyncError::RemoteList(e.to_string()))?;

            all_files.extend(files);

            match next_token {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    return Err(SyncError::RemoteList(format!(
                        "provider returned the same page token twice: {}",
                        token
                    )));
                }
                Some(_) if page_count >= MAX_PAGES => {
                    return Err(SyncError::RemoteList(format!(
                        "listing exceeded {} pages",
                        MAX_PAGES
                    )));
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let discovered = all_files.len();
        let videos = Self::filter_videos(all_files);
        info!("Discovered {} entries, {} videos", discovered, videos.len());

        Ok(videos)
    }

    fn filter_videos(files: Vec<RemoteFile>) -> Vec<RemoteFile> {
        let mut seen = HashSet::new();

        files
            .into_iter()
            .filter(is_video)
            .filter(|file| {
                if !is_safe_name(&file.name) {
                    warn!(id = %file.id, name = ?file.name, "Skipping file with unusable name");
                    return false;
                }
                if !seen.insert(file.name.clone()) {
                    warn!(id = %file.id, file = %file.name, "Skipping duplicate name");
                    return false;
                }
                true
            })
            .collect()
    }
}
