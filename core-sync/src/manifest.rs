//! # Manifest Writer
//!
//! Builds the `videos.json` document read by the gallery front end and
//! publishes it with a whole-file replace.

use crate::error::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::config::PreviewFlavor;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{info, instrument};

/// `sourceId` of records built from local files in demo mode.
pub const DEMO_SOURCE_ID: &str = "demo";

/// Human readable title from a file stem.
///
/// Dashes and underscores become spaces and the first letter of every word is
/// upper-cased: `beach-day_2` becomes `Beach Day 2`.
pub fn generate_title(stem: &str) -> String {
    let mut title = String::with_capacity(stem.len());
    let mut prev_is_word = false;

    for c in stem.chars() {
        let c = if c == '-' || c == '_' { ' ' } else { c };
        let is_word = c.is_ascii_alphanumeric();
        if is_word && !prev_is_word {
            title.push(c.to_ascii_uppercase());
        } else {
            title.push(c);
        }
        prev_is_word = is_word;
    }

    title.trim().to_string()
}

/// Percent-encoded URL of `name` under the `/<prefix>/` path.
pub fn url_for(prefix: &str, name: &str) -> String {
    format!("/{}/{}", prefix, urlencoding::encode(name))
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// One published video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRecord {
    pub name: String,
    pub title: String,
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    pub download_url: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub source_id: String,
}

impl ManifestRecord {
    /// Record for a video whose derived asset is `derived_name`.
    pub fn new(
        name: &str,
        derived_name: &str,
        flavor: PreviewFlavor,
        size_bytes: u64,
        last_modified: DateTime<Utc>,
        source_id: impl Into<String>,
    ) -> Self {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        let video_url = url_for("videos", name);

        let (preview_url, thumb_url) = match flavor {
            PreviewFlavor::Clip => (Some(url_for("previews", derived_name)), None),
            PreviewFlavor::Thumbnail => (None, Some(url_for("thumbs", derived_name))),
        };

        Self {
            name: name.to_string(),
            title: generate_title(stem),
            download_url: video_url.clone(),
            video_url,
            preview_url,
            thumb_url,
            size_bytes,
            last_modified,
            source_id: source_id.into(),
        }
    }

    /// File name of the preview this record links to.
    pub fn derived_name(&self) -> Option<String> {
        let url = self.thumb_url.as_deref().or(self.preview_url.as_deref())?;
        let encoded = url.rsplit('/').next()?;
        urlencoding::decode(encoded).ok().map(|name| name.into_owned())
    }
}

/// The published document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub videos: Vec<ManifestRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<bool>,
}

impl Manifest {
    /// Sort `videos` by title, then file name, and fill in `count`.
    ///
    /// The order is independent of the order records arrive in.
    pub fn new(mut videos: Vec<ManifestRecord>, generated_at: DateTime<Utc>, demo: bool) -> Self {
        videos.sort_by(|a, b| {
            compare_titles(&a.title, &b.title).then_with(|| a.name.cmp(&b.name))
        });

        Self {
            generated_at,
            count: videos.len(),
            videos,
            demo: demo.then_some(true),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.demo.unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.videos.iter().any(|record| record.name == name)
    }

    /// Publish to `path` through a sibling temp file.
    #[instrument(skip(self, fs), fields(count = self.count))]
    pub async fn write(&self, fs: &dyn FileSystemAccess, path: &Path) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(self)
            .map_err(|e| SyncError::ManifestWrite(e.to_string()))?;
        json.push(b'\n');

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        fs.write_file(tmp, Bytes::from(json))
            .await
            .map_err(|e| SyncError::ManifestWrite(e.to_string()))?;

        if let Err(e) = fs.rename(tmp, path).await {
            fs.delete_file(tmp).await.ok();
            return Err(SyncError::ManifestWrite(e.to_string()));
        }

        info!(path = %path.display(), "Manifest published");
        Ok(())
    }

    /// Read a previously published manifest, `None` when there is none yet.
    pub async fn load(fs: &dyn FileSystemAccess, path: &Path) -> Result<Option<Self>> {
        let data = match fs.read_file(path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(SyncError::Storage(e.to_string())),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| SyncError::Storage(format!("{} is not a manifest: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_generate_title() {
        assert_eq!(generate_title("beach-day_2"), "Beach Day 2");
        assert_eq!(generate_title("a"), "A");
        assert_eq!(generate_title("already Title"), "Already Title");
        assert_eq!(generate_title("_leading-"), "Leading");
        assert_eq!(generate_title("x2y"), "X2y");
    }

    #[test]
    fn test_url_for_encodes_segment() {
        assert_eq!(url_for("videos", "a.mp4"), "/videos/a.mp4");
        assert_eq!(url_for("thumbs", "beach day.mp4.webp"), "/thumbs/beach%20day.mp4.webp");
        assert_eq!(url_for("videos", "50%#1.mp4"), "/videos/50%25%231.mp4");
    }

    #[test]
    fn test_record_for_thumbnail_flavor() {
        let record = ManifestRecord::new(
            "beach_day.mp4",
            "beach_day.mp4.webp",
            PreviewFlavor::Thumbnail,
            42,
            at(2),
            "file-1",
        );

        assert_eq!(record.title, "Beach Day");
        assert_eq!(record.video_url, "/videos/beach_day.mp4");
        assert_eq!(record.download_url, record.video_url);
        assert_eq!(record.thumb_url.as_deref(), Some("/thumbs/beach_day.mp4.webp"));
        assert_eq!(record.preview_url, None);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sizeBytes"], 42);
        assert_eq!(json["sourceId"], "file-1");
        assert!(json.get("previewUrl").is_none());
    }

    #[test]
    fn test_record_for_clip_flavor() {
        let record = ManifestRecord::new(
            "b.mov",
            "preview_b.mov",
            PreviewFlavor::Clip,
            1,
            at(1),
            "file-2",
        );
        assert_eq!(record.preview_url.as_deref(), Some("/previews/preview_b.mov"));
        assert_eq!(record.thumb_url, None);
        assert_eq!(record.derived_name().as_deref(), Some("preview_b.mov"));
    }

    #[test]
    fn test_derived_name_decodes_url() {
        let record = ManifestRecord::new(
            "50% off.mp4",
            "50% off.mp4.webp",
            PreviewFlavor::Thumbnail,
            1,
            at(1),
            "file-3",
        );
        assert_eq!(record.derived_name().as_deref(), Some("50% off.mp4.webp"));
    }

    #[test]
    fn test_manifest_sorted_by_title() {
        let records = vec![
            ManifestRecord::new("b.mov", "b.mov.webp", PreviewFlavor::Thumbnail, 1, at(1), "2"),
            ManifestRecord::new("Zed.mp4", "Zed.mp4.webp", PreviewFlavor::Thumbnail, 1, at(1), "3"),
            ManifestRecord::new("a.mp4", "a.mp4.webp", PreviewFlavor::Thumbnail, 1, at(2), "1"),
        ];

        let manifest = Manifest::new(records, at(3), false);
        let titles: Vec<_> = manifest.videos.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "Zed"]);
        assert_eq!(manifest.count, 3);
        assert!(!manifest.is_demo());

        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("demo").is_none());
        assert_eq!(json["generatedAt"], "2024-01-03T00:00:00Z");
    }

    #[test]
    fn test_title_order_is_case_insensitive_with_stable_tiebreak() {
        assert_eq!(compare_titles("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_titles("A", "a"), Ordering::Less);
        assert_eq!(compare_titles("a", "a"), Ordering::Equal);
    }

    #[test]
    fn test_equal_titles_ordered_by_name() {
        let record = |name: &str| {
            let derived = format!("{}.webp", name);
            ManifestRecord::new(name, &derived, PreviewFlavor::Thumbnail, 1, at(1), name)
        };

        let forward = Manifest::new(vec![record("a.mp4"), record("a.mov")], at(3), false);
        let reverse = Manifest::new(vec![record("a.mov"), record("a.mp4")], at(3), false);

        let names: Vec<_> = forward.videos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.mov", "a.mp4"]);
        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&reverse).unwrap()
        );
    }

    #[test]
    fn test_demo_manifest_flag() {
        let manifest = Manifest::new(Vec::new(), at(1), true);
        assert!(manifest.is_demo());
        assert_eq!(manifest.count, 0);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["demo"], true);
        assert_eq!(json["videos"], serde_json::json!([]));
    }
}
