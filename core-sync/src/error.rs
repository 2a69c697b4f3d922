use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Unusable configuration or missing tooling; nothing has been touched.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote listing failed: {0}")]
    RemoteList(String),

    #[error("Download of {name} failed: {reason}")]
    Download { name: String, reason: String },

    #[error("Preview generation for {name} failed: {reason}")]
    Transcode { name: String, reason: String },

    #[error("Preview cache I/O failed: {0}")]
    CacheIo(String),

    #[error("Failed to write manifest: {0}")]
    ManifestWrite(String),

    /// Local filesystem failure outside of a single item.
    #[error("Local storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Only configuration errors should stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_))
    }

    pub(crate) fn download(name: &str, reason: impl ToString) -> Self {
        SyncError::Download {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transcode(name: &str, reason: impl ToString) -> Self {
        SyncError::Transcode {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
