use crate::types::RelPath;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("manifest malformed: {0}")]
    ManifestMalformed(String),

    #[error("SHA-256 digest unavailable")]
    DigestUnavailable,

    #[error("{} of {} file(s) failed to download", .failed.len(), .attempted)]
    PartialFailure { failed: Vec<RelPath>, attempted: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
