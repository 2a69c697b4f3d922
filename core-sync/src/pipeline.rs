//! # Sync Pipeline
//!
//! One complete synchronization pass.
//!
//! ## Workflow
//!
//! 1. Create the videos and preview directories
//! 2. Load the preview cache (unreadable caches are treated as empty)
//! 3. List the remote folder, or fall back to demo mode when no remote is
//!    configured or the listing fails
//! 4. Per video, with bounded concurrency: classify, fetch when missing or
//!    stale, ensure the preview
//! 5. Publish the manifest
//! 6. Optionally remove local videos that are gone remotely, keeping any
//!    the listing still names
//! 7. Save the preview cache
//!
//! A failing item is logged, reported as [`SyncEvent::ItemFailed`] and left out
//! of the manifest. Sibling items keep going.
//!
//! In demo mode the manifest is built from whatever videos already exist
//! locally, every record has `sourceId: "demo"` and the document carries
//! `demo: true`.

use crate::cache::PreviewCache;
use crate::detector::ChangeDetector;
use crate::error::{Result, SyncError};
use crate::fetcher::Fetcher;
use crate::lister::{has_supported_extension, RemoteLister};
use crate::manifest::{Manifest, ManifestRecord, DEMO_SOURCE_ID};
use crate::preview::{derived_file_name, PreviewGenerator, PreviewOutcome};
use crate::reconciler::Reconciler;
use bridge_traits::storage::{FileSystemAccess, RemoteFile, StorageProvider};
use bridge_traits::time::{Clock, SystemClock};
use bridge_traits::transcode::Transcoder;
use core_runtime::config::GalleryConfig;
use core_runtime::events::{CoreEvent, EventBus, ItemStage, SyncEvent};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: String,
    /// The manifest that was published
    pub manifest: Manifest,
    pub downloaded: usize,
    pub generated: usize,
    pub failed: usize,
    /// Local videos deleted by cleanup
    pub removed: Vec<String>,
}

impl SyncReport {
    pub fn is_demo(&self) -> bool {
        self.manifest.is_demo()
    }
}

/// Per-item result, merged by the pipeline after all items finished.
#[derive(Debug)]
enum ItemOutcome {
    Ready {
        record: ManifestRecord,
        downloaded: bool,
        preview: PreviewOutcome,
    },
    Failed {
        name: String,
        stage: ItemStage,
        error: SyncError,
    },
}

impl ItemOutcome {
    fn failed(name: &str, stage: ItemStage, error: SyncError) -> Self {
        ItemOutcome::Failed {
            name: name.to_string(),
            stage,
            error,
        }
    }
}

/// Runs synchronization passes for one gallery root.
pub struct SyncPipeline {
    config: GalleryConfig,
    fs: Arc<dyn FileSystemAccess>,
    provider: Option<Arc<dyn StorageProvider>>,
    transcoder: Arc<dyn Transcoder>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl SyncPipeline {
    /// Create a pipeline without a remote; every run is a demo run until
    /// [`with_provider`](Self::with_provider) is called.
    pub fn new(
        config: GalleryConfig,
        fs: Arc<dyn FileSystemAccess>,
        transcoder: Arc<dyn Transcoder>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            fs,
            provider: None,
            transcoder,
            clock: Arc::new(SystemClock),
            event_bus,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn StorageProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    /// Execute one pass. With `cleanup`, local videos absent from the
    /// published manifest are deleted afterwards.
    ///
    /// # Errors
    ///
    /// Only run-level failures are returned: the output directories cannot be
    /// created ([`SyncError::Storage`]) or the manifest cannot be published
    /// ([`SyncError::ManifestWrite`]). Item failures are part of the report.
    #[instrument(skip(self))]
    pub async fn run(&self, cleanup: bool) -> Result<SyncReport> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                run_id: run_id.clone(),
                cleanup,
            }))
            .ok();

        match self.execute(&run_id, cleanup).await {
            Ok(report) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        run_id: run_id.clone(),
                        count: report.manifest.count as u64,
                        downloaded: report.downloaded as u64,
                        generated: report.generated as u64,
                        failed: report.failed as u64,
                        removed: report.removed.len() as u64,
                        demo: report.is_demo(),
                        duration_ms,
                    }))
                    .ok();

                info!(
                    "Sync {} completed in {}ms: {} published, {} downloaded, {} generated, {} failed, {} removed",
                    run_id,
                    duration_ms,
                    report.manifest.count,
                    report.downloaded,
                    report.generated,
                    report.failed,
                    report.removed.len()
                );
                Ok(report)
            }
            Err(e) => {
                error!("Sync {} failed: {}", run_id, e);
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        run_id,
                        message: e.to_string(),
                    }))
                    .ok();
                Err(e)
            }
        }
    }

    async fn execute(&self, run_id: &str, cleanup: bool) -> Result<SyncReport> {
        let videos_dir = self.config.videos_dir();
        let derived_dir = self.config.derived_dir();

        // Phase 1: Output directories
        info!("Phase 1: Preparing output directories");
        for dir in [&videos_dir, &derived_dir] {
            self.fs
                .create_dir_all(dir)
                .await
                .map_err(|e| SyncError::Storage(format!("{}: {}", dir.display(), e)))?;
        }

        // Phase 2: Preview cache
        info!("Phase 2: Loading preview cache");
        let cache_path = self.config.cache_path();
        let mut cache = match PreviewCache::load(self.fs.as_ref(), &cache_path).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Ignoring preview cache: {}", e);
                PreviewCache::new()
            }
        };
        debug!("Loaded {} cache entries", cache.len());

        let generator = PreviewGenerator::new(
            Arc::clone(&self.transcoder),
            Arc::clone(&self.fs),
            Arc::clone(&self.clock),
            self.config.preview_flavor,
            &derived_dir,
            self.config.transcode_timeout,
        );

        // Phase 3: Remote listing
        info!("Phase 3: Listing remote folder");
        let remote_files = self.list_remote().await;
        let demo = remote_files.is_none();

        // Phase 4: Items
        let outcomes = match &remote_files {
            Some(files) => {
                info!("Phase 4: Processing {} remote videos", files.len());
                self.process_remote(files, &cache, &generator).await
            }
            None => {
                info!("Phase 4: Demo mode, processing local videos");
                self.process_local(&videos_dir, &cache, &generator).await
            }
        };

        let mut records = Vec::with_capacity(outcomes.len());
        let mut downloaded = 0;
        let mut generated = 0;
        let mut failed = 0;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Ready {
                    record,
                    downloaded: was_downloaded,
                    preview,
                } => {
                    if was_downloaded {
                        downloaded += 1;
                    }
                    if let PreviewOutcome::Generated { entry } = preview {
                        generated += 1;
                        cache.insert(record.name.clone(), entry);
                    }
                    records.push(record);
                }
                ItemOutcome::Failed { name, stage, error } => {
                    failed += 1;
                    warn!(file = %name, stage = %stage, "Skipping video: {}", error);
                    if stage == ItemStage::Transcode {
                        cache.remove(&name);
                    }
                    self.event_bus
                        .emit(CoreEvent::Sync(SyncEvent::ItemFailed {
                            run_id: run_id.to_string(),
                            name,
                            stage,
                            message: error.to_string(),
                        }))
                        .ok();
                }
            }
        }

        if let Some(files) = &remote_files {
            cache.retain(|name| files.iter().any(|file| file.name == name));
        }

        // Phase 5: Manifest
        info!("Phase 5: Publishing manifest with {} videos", records.len());
        let manifest = Manifest::new(records, self.clock.now(), demo);
        manifest
            .write(self.fs.as_ref(), &self.config.manifest_path())
            .await?;

        // Phase 6: Cleanup
        let removed = if cleanup {
            info!("Phase 6: Removing orphaned videos");
            // Listed videos that failed this run stay for the next attempt
            let listed = remote_files.iter().flatten().map(|file| file.name.clone());
            let reconciler = Reconciler::new(
                Arc::clone(&self.fs),
                &videos_dir,
                &derived_dir,
                self.config.preview_flavor,
            )
            .retaining(listed);
            match reconciler.reconcile(&manifest).await {
                Ok(removed) => {
                    for name in &removed {
                        cache.remove(name);
                    }
                    removed
                }
                Err(e) => {
                    warn!("Cleanup skipped: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        // Phase 7: Persist cache
        info!("Phase 7: Saving preview cache");
        if let Err(e) = cache.save(self.fs.as_ref(), &cache_path).await {
            warn!("Preview cache not saved: {}", e);
        }

        Ok(SyncReport {
            run_id: run_id.to_string(),
            manifest,
            downloaded,
            generated,
            failed,
            removed,
        })
    }

    /// `None` means demo mode.
    async fn list_remote(&self) -> Option<Vec<RemoteFile>> {
        let (Some(provider), Some(folder_id)) = (&self.provider, &self.config.folder_id) else {
            info!("No remote configured, using demo mode");
            return None;
        };

        match RemoteLister::new(Arc::clone(provider)).list(folder_id).await {
            Ok(files) => Some(files),
            Err(e) => {
                warn!("Falling back to demo mode: {}", e);
                None
            }
        }
    }

    async fn process_remote(
        &self,
        files: &[RemoteFile],
        cache: &PreviewCache,
        generator: &PreviewGenerator,
    ) -> Vec<ItemOutcome> {
        let Some(provider) = &self.provider else {
            return Vec::new();
        };
        let detector = ChangeDetector::new(Arc::clone(&self.fs));
        let fetcher = Fetcher::new(
            Arc::clone(provider),
            Arc::clone(&self.fs),
            self.config.download_timeout,
        );
        let videos_dir = self.config.videos_dir();

        // Owned items keep the per-file futures free of borrowed closure
        // arguments, so a run can be handed to `tokio::spawn`.
        stream::iter(files.to_vec())
            .map(|file| {
                let target = videos_dir.join(&file.name);
                self.sync_remote_item(file, target, cache, &detector, &fetcher, generator)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn sync_remote_item(
        &self,
        file: RemoteFile,
        target: PathBuf,
        cache: &PreviewCache,
        detector: &ChangeDetector,
        fetcher: &Fetcher,
        generator: &PreviewGenerator,
    ) -> ItemOutcome {
        let status = match detector.classify(&file, &target).await {
            Ok(status) => status,
            Err(e) => {
                return ItemOutcome::failed(
                    &file.name,
                    ItemStage::Download,
                    SyncError::download(&file.name, e),
                )
            }
        };

        let mut downloaded = false;
        if status.needs_fetch() {
            debug!(file = %file.name, ?status, "Fetching");
            if let Err(e) = fetcher.fetch(&file, &target).await {
                return ItemOutcome::failed(&file.name, ItemStage::Download, e);
            }
            downloaded = true;
        }

        let local = match self.fs.metadata(&target).await {
            Ok(meta) => meta,
            Err(e) => {
                return ItemOutcome::failed(
                    &file.name,
                    ItemStage::Download,
                    SyncError::download(&file.name, e),
                )
            }
        };

        let preview = match generator.ensure(&target, cache.get(&file.name)).await {
            Ok(preview) => preview,
            Err(e) => return ItemOutcome::failed(&file.name, ItemStage::Transcode, e),
        };

        let last_modified = file
            .modified_at
            .or(local.modified_at)
            .unwrap_or_else(|| self.clock.now());

        ItemOutcome::Ready {
            record: ManifestRecord::new(
                &file.name,
                &derived_file_name(generator.flavor(), &file.name),
                generator.flavor(),
                local.size,
                last_modified,
                file.id,
            ),
            downloaded,
            preview,
        }
    }

    async fn process_local(
        &self,
        videos_dir: &Path,
        cache: &PreviewCache,
        generator: &PreviewGenerator,
    ) -> Vec<ItemOutcome> {
        let entries = match self.fs.list_directory(videos_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", videos_dir.display(), e);
                return Vec::new();
            }
        };

        let mut videos: Vec<PathBuf> = entries
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(has_supported_extension)
                    .unwrap_or(false)
            })
            .collect();
        videos.sort();

        stream::iter(videos)
            .map(|path| self.sync_local_item(path, cache, generator))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await
    }

    /// `None` for directory entries that only look like videos.
    async fn sync_local_item(
        &self,
        path: PathBuf,
        cache: &PreviewCache,
        generator: &PreviewGenerator,
    ) -> Option<ItemOutcome> {
        let name = path.file_name()?.to_str()?.to_string();

        let local = match self.fs.metadata(&path).await {
            Ok(meta) if meta.is_directory => return None,
            Ok(meta) => meta,
            Err(e) => {
                return Some(ItemOutcome::failed(
                    &name,
                    ItemStage::Transcode,
                    SyncError::transcode(&name, e),
                ))
            }
        };

        let preview = match generator.ensure(&path, cache.get(&name)).await {
            Ok(preview) => preview,
            Err(e) => return Some(ItemOutcome::failed(&name, ItemStage::Transcode, e)),
        };

        Some(ItemOutcome::Ready {
            record: ManifestRecord::new(
                &name,
                &derived_file_name(generator.flavor(), &name),
                generator.flavor(),
                local.size,
                local.modified_at.unwrap_or_else(|| self.clock.now()),
                DEMO_SOURCE_ID,
            ),
            downloaded: false,
            preview,
        })
    }
}
