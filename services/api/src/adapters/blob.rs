//! services/api/src/adapters/blob.rs
//!
//! This module contains the filesystem adapter for the `BlobStore` port.
//! Uploaded bytes (cover photos, media souvenirs) land under the configured
//! blob root and are served back at `{public_base_url}/blobs/{path}`.

use async_trait::async_trait;
use baliseboxd_core::ports::{BlobStore, PortError, PortResult, ProgressFn};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Uploads are written in chunks of this size so progress callbacks fire
/// at a useful granularity.
const CHUNK_SIZE: usize = 64 * 1024;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `BlobStore` port on the local filesystem.
#[derive(Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    /// Creates a new `FsBlobStore`.
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Rejects empty or traversal paths before they touch the filesystem.
    fn resolve(&self, path: &str) -> PortResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(PortError::Unexpected(format!("Invalid blob path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

//=========================================================================================
// `BlobStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlobStore for FsBlobStore {
    /// Writes `data` under the blob root and returns its public URL.
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        progress: Option<&ProgressFn>,
    ) -> PortResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }

        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let total = data.len() as u64;
        let mut written = 0u64;
        for chunk in data.chunks(CHUNK_SIZE) {
            file.write_all(chunk)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            written += chunk.len() as u64;
            if let Some(report) = progress {
                report(written, total);
            }
        }
        file.flush()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(format!("{}/blobs/{}", self.public_base_url, path))
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    fn store() -> FsBlobStore {
        let root = std::env::temp_dir().join(format!("baliseboxd-blobs-{}", Uuid::new_v4()));
        FsBlobStore::new(root, "http://localhost:3000/".to_string())
    }

    #[tokio::test]
    async fn put_writes_the_file_and_returns_its_url() {
        let store = store();
        let url = store
            .put("parties/p1/cover/photo.jpg", b"fake image bytes", None)
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/blobs/parties/p1/cover/photo.jpg");

        let on_disk = tokio::fs::read(store.root.join("parties/p1/cover/photo.jpg"))
            .await
            .unwrap();
        assert_eq!(on_disk, b"fake image bytes");
    }

    #[tokio::test]
    async fn put_reports_progress_up_to_the_total() {
        let store = store();
        let data = vec![0u8; CHUNK_SIZE + 123];
        let last_seen = std::sync::Arc::new(AtomicU64::new(0));

        let progress = {
            let last_seen = std::sync::Arc::clone(&last_seen);
            move |written: u64, total: u64| {
                assert!(written <= total);
                last_seen.store(written, Ordering::SeqCst);
            }
        };
        store.put("big.bin", &data, Some(&progress)).await.unwrap();

        assert_eq!(last_seen.load(Ordering::SeqCst), data.len() as u64);
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let store = store();
        assert!(store.put("../escape.txt", b"nope", None).await.is_err());
        assert!(store.put("", b"nope", None).await.is_err());
    }
}
