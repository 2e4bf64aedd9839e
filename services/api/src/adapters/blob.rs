//! services/api/src/adapters/blob.rs
//!
//! A `BlobStorage` that writes files below a local directory which the web
//! layer serves as static files.

use async_trait::async_trait;
use bytes::Bytes;
use reading_rewards_core::ports::{BlobStorage, PortError, PortResult};
use std::path::{Component, Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: PathBuf, public_url: String) -> Self {
        Self { root, public_url }
    }

    /// Resolves `path` below the root. Absolute paths and `..` are refused.
    fn resolve(&self, path: &str) -> PortResult<PathBuf> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !is_plain {
            return Err(PortError::InvalidContent(format!("Invalid blob path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, bytes: Bytes, path: &str, content_type: &str) -> PortResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!(path, content_type, size = bytes.len(), "Blob stored.");
        Ok(format!("{}/{}", self.public_url, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("blob-test-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_public_url() {
        let root = temp_root("upload");
        let storage = LocalBlobStorage::new(root.clone(), "/blobs".to_string());

        let url = storage
            .upload(Bytes::from_static(b"png"), "generated-skins/1-Lava.png", "image/png")
            .await
            .unwrap();

        assert_eq!(url, "/blobs/generated-skins/1-Lava.png");
        let written = tokio::fs::read(root.join("generated-skins/1-Lava.png")).await.unwrap();
        assert_eq!(written, b"png");
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let storage = LocalBlobStorage::new(temp_root("escape"), "/blobs".to_string());
        for path in ["../secret", "/etc/passwd", "a/../../b", ""] {
            let err = storage.upload(Bytes::new(), path, "text/plain").await.unwrap_err();
            assert!(matches!(err, PortError::InvalidContent(_)), "{}", path);
        }
    }
}
