//! # Reconciler
//!
//! Removes local videos that are no longer part of the remote set, together
//! with their derived previews.
//!
//! A video survives when the manifest publishes it or when the remote listing
//! still names it. The latter covers videos whose preview failed this run,
//! which would otherwise be deleted and downloaded again on every pass.
//! A preview file that any published record links to is never deleted.

use crate::error::{Result, SyncError};
use crate::lister::has_supported_extension;
use crate::manifest::Manifest;
use crate::preview::derived_file_name;
use bridge_traits::storage::FileSystemAccess;
use core_runtime::config::PreviewFlavor;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Placeholder that keeps the videos directory under version control.
pub const SENTINEL_FILE: &str = ".gitkeep";

pub struct Reconciler {
    fs: Arc<dyn FileSystemAccess>,
    videos_dir: PathBuf,
    derived_dir: PathBuf,
    flavor: PreviewFlavor,
    retained: HashSet<String>,
}

impl Reconciler {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        videos_dir: impl Into<PathBuf>,
        derived_dir: impl Into<PathBuf>,
        flavor: PreviewFlavor,
    ) -> Self {
        Self {
            fs,
            videos_dir: videos_dir.into(),
            derived_dir: derived_dir.into(),
            flavor,
            retained: HashSet::new(),
        }
    }

    /// Also keep videos named here even when the manifest leaves them out.
    pub fn retaining<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retained.extend(names.into_iter().map(Into::into));
        self
    }

    /// Delete every local video not named in `manifest` or retained.
    ///
    /// Returns the names of the removed videos. Demo manifests are built from
    /// the local files themselves and are never reconciled against.
    ///
    /// # Errors
    ///
    /// [`SyncError::Storage`] when the videos directory cannot be listed.
    /// Failures to delete individual files are logged and skipped.
    #[instrument(skip(self, manifest), fields(records = manifest.count))]
    pub async fn reconcile(&self, manifest: &Manifest) -> Result<Vec<String>> {
        if manifest.is_demo() {
            debug!("Demo manifest, skipping cleanup");
            return Ok(Vec::new());
        }

        let entries = self
            .fs
            .list_directory(&self.videos_dir)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let published: HashSet<String> = manifest
            .videos
            .iter()
            .filter_map(|record| record.derived_name())
            .collect();

        let mut removed = Vec::new();

        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == SENTINEL_FILE
                || !has_supported_extension(name)
                || manifest.contains(name)
                || self.retained.contains(name)
            {
                continue;
            }

            match self.fs.try_metadata(&path).await {
                Ok(Some(meta)) if !meta.is_directory => {}
                _ => continue,
            }

            if let Err(e) = self.fs.delete_file(&path).await {
                warn!(file = %name, error = %e, "Failed to remove orphaned video");
                continue;
            }
            info!(file = %name, "Removed orphaned video");

            let derived_name = derived_file_name(self.flavor, name);
            if published.contains(&derived_name) {
                warn!(file = %name, preview = %derived_name, "Preview still published, keeping it");
            } else {
                let derived = self.derived_dir.join(&derived_name);
                match self.fs.delete_file(&derived).await {
                    Ok(()) => debug!(preview = %derived_name, "Removed orphaned preview"),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => warn!(file = %name, error = %e, "Failed to remove orphaned preview"),
                }
            }

            removed.push(name.to_string());
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestRecord;
    use bridge_desktop::TokioFileSystem;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use tempfile::TempDir;

    async fn touch(path: &Path) {
        tokio::fs::write(path, b"x").await.unwrap();
    }

    fn record(name: &str, derived_name: &str) -> ManifestRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ManifestRecord::new(name, derived_name, PreviewFlavor::Thumbnail, 1, at, "id")
    }

    fn manifest(records: Vec<ManifestRecord>, demo: bool) -> Manifest {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        Manifest::new(records, at, demo)
    }

    struct Gallery {
        _dir: TempDir,
        videos: PathBuf,
        thumbs: PathBuf,
    }

    impl Gallery {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let videos = dir.path().join("videos");
            let thumbs = dir.path().join("thumbs");
            tokio::fs::create_dir_all(&videos).await.unwrap();
            tokio::fs::create_dir_all(&thumbs).await.unwrap();
            Self {
                _dir: dir,
                videos,
                thumbs,
            }
        }

        fn reconciler(&self) -> Reconciler {
            Reconciler::new(
                Arc::new(TokioFileSystem::new()),
                &self.videos,
                &self.thumbs,
                PreviewFlavor::Thumbnail,
            )
        }
    }

    #[tokio::test]
    async fn test_removes_orphan_and_its_preview() {
        let g = Gallery::new().await;
        touch(&g.videos.join("a.mp4")).await;
        touch(&g.videos.join("old.mkv")).await;
        touch(&g.videos.join(SENTINEL_FILE)).await;
        touch(&g.videos.join("notes.txt")).await;
        touch(&g.thumbs.join("a.mp4.webp")).await;
        touch(&g.thumbs.join("old.mkv.webp")).await;

        let published = manifest(vec![record("a.mp4", "a.mp4.webp")], false);
        let removed = g.reconciler().reconcile(&published).await.unwrap();

        assert_eq!(removed, vec!["old.mkv".to_string()]);
        assert!(!g.videos.join("old.mkv").exists());
        assert!(!g.thumbs.join("old.mkv.webp").exists());
        assert!(g.videos.join("a.mp4").exists());
        assert!(g.thumbs.join("a.mp4.webp").exists());
        assert!(g.videos.join(SENTINEL_FILE).exists());
        assert!(g.videos.join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_keeps_preview_linked_from_manifest() {
        let g = Gallery::new().await;
        touch(&g.videos.join("a.mp4")).await;
        touch(&g.videos.join("a.mov")).await;
        touch(&g.thumbs.join("a.mov.webp")).await;

        // A record that links to the orphan's preview file
        let published = manifest(vec![record("a.mp4", "a.mov.webp")], false);
        let removed = g.reconciler().reconcile(&published).await.unwrap();

        assert_eq!(removed, vec!["a.mov".to_string()]);
        assert!(!g.videos.join("a.mov").exists());
        assert!(g.thumbs.join("a.mov.webp").exists());
    }

    #[tokio::test]
    async fn test_retained_names_survive() {
        let g = Gallery::new().await;
        touch(&g.videos.join("broken.webm")).await;

        let published = manifest(Vec::new(), false);
        let removed = g
            .reconciler()
            .retaining(["broken.webm"])
            .reconcile(&published)
            .await
            .unwrap();

        assert!(removed.is_empty());
        assert!(g.videos.join("broken.webm").exists());
    }

    #[tokio::test]
    async fn test_demo_manifest_is_not_reconciled() {
        let g = Gallery::new().await;
        touch(&g.videos.join("local.mp4")).await;

        let removed = g
            .reconciler()
            .reconcile(&manifest(Vec::new(), true))
            .await
            .unwrap();

        assert!(removed.is_empty());
        assert!(g.videos.join("local.mp4").exists());
    }
}
