//! # Preview Cache
//!
//! Remembers which source version each preview was generated from.
//!
//! Persisted as `.thumb-cache.json`, a JSON object keyed by video file name:
//!
//! ```json
//! { "a.mp4": { "hash": "3f2a…", "generated": "2024-05-01T10:00:00Z" } }
//! ```
//!
//! The file is read once at the start of a run and fully rewritten at the end.
//! Only the pipeline mutates the in-memory map.

use crate::error::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Fingerprint of the source a preview was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub generated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cache file. A missing file yields an empty cache.
    pub async fn load(fs: &dyn FileSystemAccess, path: &Path) -> Result<Self> {
        let data = match fs.read_file(path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(Self::new()),
            Err(e) => return Err(SyncError::CacheIo(e.to_string())),
        };

        serde_json::from_slice(&data)
            .map_err(|e| SyncError::CacheIo(format!("{} is not valid JSON: {}", path.display(), e)))
    }

    /// Replace the cache file with the current contents.
    pub async fn save(&self, fs: &dyn FileSystemAccess, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| SyncError::CacheIo(e.to_string()))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        fs.write_file(tmp, Bytes::from(json))
            .await
            .map_err(|e| SyncError::CacheIo(e.to_string()))?;
        fs.rename(tmp, path)
            .await
            .map_err(|e| SyncError::CacheIo(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&CacheEntry> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<CacheEntry> {
        self.entries.remove(name)
    }

    /// Drop entries whose name fails `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|name, _| keep(name));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cache_file_format() {
        let mut cache = PreviewCache::new();
        cache.insert(
            "a.mp4",
            CacheEntry {
                hash: "abc".to_string(),
                generated: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            },
        );

        let json = serde_json::to_value(&cache).unwrap();
        assert_eq!(json["a.mp4"]["hash"], "abc");
        assert_eq!(json["a.mp4"]["generated"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_reads_legacy_millisecond_timestamps() {
        let cache: PreviewCache = serde_json::from_str(
            r#"{"clip.mov":{"hash":"d41d8cd98f00b204e9800998ecf8427e","generated":"2024-05-01T10:00:00.123Z"}}"#,
        )
        .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("clip.mov").map(|e| e.hash.as_str()),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
    }

    #[test]
    fn test_insert_and_remove() {
        let mut cache = PreviewCache::new();
        assert!(cache.is_empty());

        let entry = CacheEntry {
            hash: "h".to_string(),
            generated: Utc::now(),
        };
        cache.insert("a.mp4", entry.clone());
        assert_eq!(cache.get("a.mp4"), Some(&entry));
        assert_eq!(cache.remove("a.mp4"), Some(entry));
        assert!(cache.get("a.mp4").is_none());
    }

    #[test]
    fn test_retain() {
        let mut cache = PreviewCache::new();
        for name in ["a.mp4", "b.mov", "gone.mkv"] {
            cache.insert(
                name,
                CacheEntry {
                    hash: name.to_string(),
                    generated: Utc::now(),
                },
            );
        }

        cache.retain(|name| name != "gone.mkv");
        assert_eq!(cache.len(), 2);
        assert!(cache.get("gone.mkv").is_none());
    }
}
