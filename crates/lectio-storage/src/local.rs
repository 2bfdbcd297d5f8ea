use crate::traits::{MediaKind, MediaStore, StorageError, StorageResult, StoredAsset};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem media store. Files are served by the API under `base_url`.
#[derive(Clone, Debug)]
pub struct LocalMediaStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    /// * `base_path` - Root directory for stored assets (e.g. "/var/lib/lectio/media")
    /// * `base_url` - Public URL the directory is served at (e.g. "http://localhost:8080/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn asset_path(&self, asset_id: &str) -> StorageResult<PathBuf> {
        if asset_id.is_empty() || asset_id.contains("..") || asset_id.starts_with('/') {
            return Err(StorageError::InvalidKey(asset_id.to_string()));
        }
        Ok(self.base_path.join(asset_id))
    }

    fn generate_asset_id(kind: MediaKind, filename: &str) -> String {
        let id = Uuid::new_v4();
        match extension_of(filename) {
            Some(ext) => format!("{}/{}.{}", kind.folder(), id, ext),
            None => format!("{}/{}", kind.folder(), id),
        }
    }

    fn public_url(&self, asset_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), asset_id)
    }
}

/// Lowercased extension, restricted to ASCII alphanumerics.
fn extension_of(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        _content_type: &str,
        kind: MediaKind,
    ) -> StorageResult<StoredAsset> {
        let asset_id = Self::generate_asset_id(kind, filename);
        let path = self.asset_path(&asset_id)?;
        let size = data.len();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        let url = self.public_url(&asset_id);

        tracing::info!(
            asset_id = %asset_id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local media upload successful"
        );

        Ok(StoredAsset {
            asset_id,
            url,
            duration_seconds: None,
        })
    }

    async fn delete(&self, asset_id: &str) -> StorageResult<()> {
        let path = self.asset_path(asset_id)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(asset_id = %asset_id, "Local media asset deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(asset_id = %asset_id, "Local media asset already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
