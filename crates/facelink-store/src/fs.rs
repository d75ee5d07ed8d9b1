//! Filesystem-backed object store.
//!
//! Blobs land under a root directory; URLs are `base_url` + key. Key
//! uniqueness is caller-guaranteed, so a repeated put simply overwrites.

use async_trait::async_trait;
use facelink_core::capability::{ObjectStore, ObjectStoreError};
use std::path::PathBuf;

pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStore {
    /// Create the root directory if needed.
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Result<Self, ObjectStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|err| ObjectStoreError::Unavailable(err.to_string()))?;
        Ok(Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        // Keys are generated internally; refuse anything that escapes root.
        if key.contains("..") || key.starts_with('/') {
            return Err(ObjectStoreError::Unavailable(format!(
                "invalid object key: {key}"
            )));
        }

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| ObjectStoreError::Unavailable(err.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| ObjectStoreError::Unavailable(err.to_string()))?;

        tracing::debug!(key, size = bytes.len(), "object stored");
        Ok(format!("{}/{key}", self.base_url))
    }
}
