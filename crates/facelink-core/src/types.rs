use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized bounding box for a detected face, coordinates in `[0, 1]`
/// relative to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// A face reported by the recognition service's detector. Ephemeral:
/// consumed within one pipeline run, never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

/// Pixel-space face region derived from a [`BoundingBox`] and the image
/// dimensions.
///
/// Invariants after clamping: `left + width <= image_width`,
/// `top + height <= image_height`, `width >= 1`, `height >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One candidate returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatch {
    pub identity_id: String,
    /// Similarity score in percent. Higher = more similar.
    pub similarity: f32,
}

/// The recognition service's notion of "the same face", independent of
/// which image it appears in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub identity_id: String,
    /// Caller-supplied reference attached at enrollment time.
    pub external_ref: String,
}

/// Durable link between one identity and one image via a thumbnail.
///
/// Composite key `(identity_id, image_key)`: at most one record per pair,
/// writes are idempotent upserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRecord {
    pub identity_id: String,
    pub image_key: String,
    pub thumbnail_url: String,
    pub thumbnail_id: String,
    pub timestamp: DateTime<Utc>,
}

/// One stored image as seen by the gallery queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub image_key: String,
    pub timestamp: DateTime<Utc>,
    pub identity_count: u64,
}

/// One known identity as seen by the gallery queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub identity_id: String,
    pub thumbnail_url: String,
    pub image_count: u64,
}

/// Why a single face's branch of the pipeline terminated without an
/// association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Bounding box collapsed to zero area after clamping; the face is
    /// skipped, the image continues.
    DegenerateRegion,
    /// Thumbnail cropping or encoding failed.
    ExtractionFailed,
    /// Similarity search or enrollment failed with a service error.
    RecognitionFailed,
    /// Object or mapping write failed; retryable with identical inputs.
    WriteFailed,
    /// An external call exceeded its budget; retryable.
    TimedOut,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::DegenerateRegion => "DegenerateRegion",
            FailureReason::ExtractionFailed => "ExtractionFailed",
            FailureReason::RecognitionFailed => "RecognitionFailed",
            FailureReason::WriteFailed => "WriteFailed",
            FailureReason::TimedOut => "TimedOut",
        })
    }
}

/// A per-face failure entry in the image-level result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceFailure {
    pub face_index: usize,
    pub reason: FailureReason,
}

/// Terminal per-image report, produced once every per-face branch has
/// reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Faces the detector reported for this image.
    pub face_count: usize,
    /// Faces whose association write succeeded.
    pub persisted_count: usize,
    /// Resolved identity ids in face order, duplicate-free.
    pub identity_ids: Vec<String>,
    pub failures: Vec<FaceFailure>,
}
