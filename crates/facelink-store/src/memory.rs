//! In-memory adapters for tests and development.

use async_trait::async_trait;
use facelink_core::capability::{
    MappingStore, MappingStoreError, ObjectStore, ObjectStoreError,
};
use facelink_core::types::{AssociationRecord, IdentitySummary, ImageSummary};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Mapping store backed by a `HashMap` keyed by `(identity_id, image_key)`.
#[derive(Default)]
pub struct InMemoryMappingStore {
    records: RwLock<HashMap<(String, String), AssociationRecord>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn upsert(&self, record: &AssociationRecord) -> Result<(), MappingStoreError> {
        self.records.write().await.insert(
            (record.identity_id.clone(), record.image_key.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn query_by_identity(
        &self,
        identity_id: &str,
    ) -> Result<Vec<AssociationRecord>, MappingStoreError> {
        let records = self.records.read().await;
        let mut found: Vec<AssociationRecord> = records
            .values()
            .filter(|r| r.identity_id == identity_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.image_key.cmp(&b.image_key));
        Ok(found)
    }

    async fn query_by_image(
        &self,
        image_key: &str,
    ) -> Result<Vec<AssociationRecord>, MappingStoreError> {
        let records = self.records.read().await;
        let mut found: Vec<AssociationRecord> = records
            .values()
            .filter(|r| r.image_key == image_key)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.identity_id.cmp(&b.identity_id));
        Ok(found)
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, MappingStoreError> {
        let records = self.records.read().await;
        let mut by_image: HashMap<&str, ImageSummary> = HashMap::new();
        for record in records.values() {
            by_image
                .entry(&record.image_key)
                .and_modify(|summary| {
                    summary.identity_count += 1;
                    if record.timestamp > summary.timestamp {
                        summary.timestamp = record.timestamp;
                    }
                })
                .or_insert_with(|| ImageSummary {
                    image_key: record.image_key.clone(),
                    timestamp: record.timestamp,
                    identity_count: 1,
                });
        }
        let mut summaries: Vec<ImageSummary> = by_image.into_values().collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.image_key.cmp(&b.image_key)));
        Ok(summaries)
    }

    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, MappingStoreError> {
        let records = self.records.read().await;
        let mut by_identity: HashMap<&str, IdentitySummary> = HashMap::new();
        for record in records.values() {
            by_identity
                .entry(&record.identity_id)
                .and_modify(|summary| {
                    summary.image_count += 1;
                    if record.thumbnail_url < summary.thumbnail_url {
                        summary.thumbnail_url = record.thumbnail_url.clone();
                    }
                })
                .or_insert_with(|| IdentitySummary {
                    identity_id: record.identity_id.clone(),
                    thumbnail_url: record.thumbnail_url.clone(),
                    image_count: 1,
                });
        }
        let mut summaries: Vec<IdentitySummary> = by_identity.into_values().collect();
        summaries.sort_by(|a, b| a.identity_id.cmp(&b.identity_id));
        Ok(summaries)
    }

    async fn purge(&self) -> Result<u64, MappingStoreError> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}

/// Object store that keeps blobs in memory and hands out `mem://` URLs.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes for `key`, if present.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|(bytes, _)| bytes.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(format!("mem://{key}"))
    }
}
