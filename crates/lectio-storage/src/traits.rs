//! Media store trait and shared types.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Media store operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Invalid asset id: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// What is being stored. Determines the folder assets are grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Thumbnail,
}

impl MediaKind {
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Video => "course-videos",
            MediaKind::Thumbnail => "video-thumbnails",
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAsset {
    /// Opaque id to pass to [`MediaStore::delete`].
    pub asset_id: String,
    /// Permanent retrieval URL.
    pub url: String,
    /// Media duration when the backend can report it. The local backend cannot; the
    /// processing pipeline probes it instead.
    pub duration_seconds: Option<f64>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `data` and return its id and public URL.
    ///
    /// `filename` is only used for its extension; the stored name is generated.
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        content_type: &str,
        kind: MediaKind,
    ) -> StorageResult<StoredAsset>;

    /// Delete a previously stored asset. Deleting a missing asset is not an error.
    async fn delete(&self, asset_id: &str) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folders_per_kind() {
        assert_eq!(MediaKind::Video.folder(), "course-videos");
        assert_eq!(MediaKind::Thumbnail.folder(), "video-thumbnails");
    }
}
