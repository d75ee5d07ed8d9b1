//! Capability contracts for the pipeline's external collaborators.
//!
//! The orchestrator only ever sees these traits; concrete adapters (SQLite,
//! filesystem, HTTP) live in sibling crates, and tests substitute stubs.

use crate::types::{
    AssociationRecord, DetectedFace, FaceMatch, Identity, IdentitySummary, ImageSummary,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Blob storage for original images and thumbnails. Key uniqueness is
/// caller-guaranteed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return a stable URL for the object.
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The service rejected the input as unsuitable for matching (too small
    /// or ambiguous). Identity resolution treats this as a no-match, not a
    /// failure.
    #[error("input rejected by recognition service: {0}")]
    InvalidInput(String),
    #[error("recognition service failure: {0}")]
    Service(String),
}

/// The external face recognition service: whole-image detection plus
/// similarity search and enrollment against a named identity collection.
#[async_trait]
pub trait FaceRecognition: Send + Sync {
    /// Detect faces in `image`, returning normalized bounding boxes.
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, RecognitionError>;

    /// Best enrolled candidates for `thumbnail`, filtered by `threshold`
    /// (percent) and capped at `max_results`. Zero candidates is a valid
    /// no-match outcome.
    async fn search_similar(
        &self,
        thumbnail: &[u8],
        collection: &str,
        threshold: f32,
        max_results: u32,
    ) -> Result<Vec<FaceMatch>, RecognitionError>;

    /// Enroll `thumbnail` as a new identity in `collection` and return the
    /// minted identity reference.
    async fn enroll(
        &self,
        thumbnail: &[u8],
        collection: &str,
        external_ref: &str,
    ) -> Result<Identity, RecognitionError>;

    /// Remove every enrolled identity from `collection`, returning the
    /// count removed.
    async fn purge(&self, collection: &str) -> Result<u64, RecognitionError>;
}

#[derive(Error, Debug)]
pub enum MappingStoreError {
    #[error("mapping store unavailable: {0}")]
    Unavailable(String),
}

/// Durable identity↔image association records, keyed by
/// `(identity_id, image_key)`.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Insert or overwrite the record for its composite key. Writing twice
    /// with identical content is a no-op.
    async fn upsert(&self, record: &AssociationRecord) -> Result<(), MappingStoreError>;

    /// All images a given identity appears in.
    async fn query_by_identity(
        &self,
        identity_id: &str,
    ) -> Result<Vec<AssociationRecord>, MappingStoreError>;

    /// All identities appearing in a given image.
    async fn query_by_image(
        &self,
        image_key: &str,
    ) -> Result<Vec<AssociationRecord>, MappingStoreError>;

    /// Distinct stored images, most recent first.
    async fn list_images(&self) -> Result<Vec<ImageSummary>, MappingStoreError>;

    /// Known identities, each with a sample thumbnail and image count.
    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, MappingStoreError>;

    /// Delete every association, returning the count removed.
    async fn purge(&self) -> Result<u64, MappingStoreError>;
}
