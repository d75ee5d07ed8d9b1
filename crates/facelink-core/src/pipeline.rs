//! Per-image pipeline orchestration.
//!
//! Drives `Received → Detecting → (per face: Resolving → Persisted |
//! Skipped | Failed)* → Completed` for every detected face: geometry
//! resolution, thumbnail extraction, identity resolution, association
//! write. A detection failure fails the whole image; any later failure is
//! recorded against its face and never aborts siblings.

use crate::capability::{FaceRecognition, MappingStore, ObjectStore, RecognitionError};
use crate::geometry;
use crate::thumbnail;
use crate::types::{AssociationRecord, DetectedFace, FaceFailure, FailureReason, PipelineResult};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Fixed match policy: a search candidate below this similarity (percent)
/// is a distinct person. Not user-tunable.
pub const SIMILARITY_THRESHOLD: f32 = 90.0;

const MAX_SEARCH_RESULTS: u32 = 1;
const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";
const THUMBNAIL_KEY_PREFIX: &str = "thumbnails/";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("face detection failed: {0}")]
    Detection(#[from] RecognitionError),
    #[error("face detection timed out after {0:?}")]
    DetectionTimeout(Duration),
}

/// One image entering the pipeline. `bytes` is shared with blocking decode
/// tasks, hence the `Arc`.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub image_key: String,
    pub bytes: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub stored_at: DateTime<Utc>,
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Recognition collection holding the enrolled identities.
    pub collection: String,
    /// Budget applied to every external call.
    pub call_timeout: Duration,
    /// Upper bound on concurrently processed faces within one image.
    pub max_parallel_faces: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            collection: "faces".to_string(),
            call_timeout: Duration::from_secs(10),
            max_parallel_faces: 4,
        }
    }
}

/// Terminal state of one face's branch.
enum FaceOutcome {
    Persisted {
        face_index: usize,
        identity_id: String,
    },
    Failed {
        face_index: usize,
        reason: FailureReason,
    },
}

impl FaceOutcome {
    fn face_index(&self) -> usize {
        match self {
            FaceOutcome::Persisted { face_index, .. } | FaceOutcome::Failed { face_index, .. } => {
                *face_index
            }
        }
    }
}

enum ResolveError {
    TimedOut,
    Recognition(RecognitionError),
}

/// The pipeline orchestrator. External collaborators are injected as
/// capability traits; tests substitute stubs.
///
/// Per face, the thumbnail upload always completes before the association
/// write is attempted: a cancelled or failed face can orphan a thumbnail
/// object (reclaimed on retry via its deterministic key) but never an
/// association that references a thumbnail which was never uploaded.
pub struct FacePipeline {
    recognition: Arc<dyn FaceRecognition>,
    objects: Arc<dyn ObjectStore>,
    mappings: Arc<dyn MappingStore>,
    options: PipelineOptions,
    /// Serializes the search-again-then-enroll decision; see
    /// [`FacePipeline::resolve_identity`].
    enroll_lock: Mutex<()>,
}

impl FacePipeline {
    pub fn new(
        recognition: Arc<dyn FaceRecognition>,
        objects: Arc<dyn ObjectStore>,
        mappings: Arc<dyn MappingStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            recognition,
            objects,
            mappings,
            options,
            enroll_lock: Mutex::new(()),
        }
    }

    /// Run the full pipeline for one image.
    ///
    /// Faces are processed on a bounded concurrent pool; within one face the
    /// steps are strictly sequential. Per-face failures land in the result's
    /// `failures` list, never in the returned error.
    pub async fn process_image(
        &self,
        request: &ImageRequest,
    ) -> Result<PipelineResult, PipelineError> {
        let detection = self.recognition.detect_faces(&request.bytes);
        let faces = match timeout(self.options.call_timeout, detection).await {
            Err(_) => return Err(PipelineError::DetectionTimeout(self.options.call_timeout)),
            Ok(Err(err)) => return Err(PipelineError::Detection(err)),
            Ok(Ok(faces)) => faces,
        };
        tracing::info!(
            image_key = %request.image_key,
            faces = faces.len(),
            "detection complete"
        );

        let mut outcomes: Vec<FaceOutcome> = stream::iter(faces.into_iter().enumerate())
            .map(|(face_index, face)| self.process_face(request, face_index, face))
            .buffer_unordered(self.options.max_parallel_faces.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(FaceOutcome::face_index);

        let face_count = outcomes.len();
        let mut persisted_count = 0;
        let mut identity_ids: Vec<String> = Vec::new();
        let mut failures: Vec<FaceFailure> = Vec::new();
        for outcome in outcomes {
            match outcome {
                FaceOutcome::Persisted { identity_id, .. } => {
                    persisted_count += 1;
                    if !identity_ids.contains(&identity_id) {
                        identity_ids.push(identity_id);
                    }
                }
                FaceOutcome::Failed { face_index, reason } => {
                    failures.push(FaceFailure { face_index, reason });
                }
            }
        }

        tracing::info!(
            image_key = %request.image_key,
            face_count,
            persisted_count,
            failed = failures.len(),
            "image completed"
        );

        Ok(PipelineResult {
            face_count,
            persisted_count,
            identity_ids,
            failures,
        })
    }

    /// One face's branch: region → thumbnail → upload → identity → write.
    async fn process_face(
        &self,
        request: &ImageRequest,
        face_index: usize,
        face: DetectedFace,
    ) -> FaceOutcome {
        let failed = |reason: FailureReason| FaceOutcome::Failed { face_index, reason };

        let region = match geometry::resolve_region(&face.bounding_box, request.width, request.height)
        {
            Ok(region) => region,
            Err(err) => {
                tracing::debug!(
                    image_key = %request.image_key,
                    face_index,
                    %err,
                    "face skipped"
                );
                return failed(FailureReason::DegenerateRegion);
            }
        };

        let bytes = Arc::clone(&request.bytes);
        let extraction =
            tokio::task::spawn_blocking(move || thumbnail::extract_thumbnail(&bytes, &region));
        let thumb = match extraction.await {
            Ok(Ok(thumb)) => thumb,
            Ok(Err(err)) => {
                tracing::warn!(
                    image_key = %request.image_key,
                    face_index,
                    %err,
                    "thumbnail extraction failed"
                );
                return failed(FailureReason::ExtractionFailed);
            }
            Err(err) => {
                tracing::warn!(
                    image_key = %request.image_key,
                    face_index,
                    %err,
                    "thumbnail task aborted"
                );
                return failed(FailureReason::ExtractionFailed);
            }
        };

        let thumbnail_id = thumbnail_id(&request.image_key, face_index);
        let thumbnail_key = format!("{THUMBNAIL_KEY_PREFIX}{thumbnail_id}.jpg");
        let upload = self
            .objects
            .put(&thumbnail_key, &thumb, THUMBNAIL_CONTENT_TYPE);
        let thumbnail_url = match timeout(self.options.call_timeout, upload).await {
            Err(_) => {
                tracing::warn!(image_key = %request.image_key, face_index, "thumbnail upload timed out");
                return failed(FailureReason::TimedOut);
            }
            Ok(Err(err)) => {
                tracing::warn!(image_key = %request.image_key, face_index, %err, "thumbnail upload failed");
                return failed(FailureReason::WriteFailed);
            }
            Ok(Ok(url)) => url,
        };

        let identity_id = match self.resolve_identity(&thumb, &thumbnail_id).await {
            Ok(identity_id) => identity_id,
            Err(ResolveError::TimedOut) => {
                tracing::warn!(image_key = %request.image_key, face_index, "identity resolution timed out");
                return failed(FailureReason::TimedOut);
            }
            Err(ResolveError::Recognition(err)) => {
                tracing::warn!(image_key = %request.image_key, face_index, %err, "identity resolution failed");
                return failed(FailureReason::RecognitionFailed);
            }
        };

        let record = AssociationRecord {
            identity_id: identity_id.clone(),
            image_key: request.image_key.clone(),
            thumbnail_url,
            thumbnail_id,
            timestamp: request.stored_at,
        };
        match timeout(self.options.call_timeout, self.mappings.upsert(&record)).await {
            Err(_) => {
                tracing::warn!(image_key = %request.image_key, face_index, "association write timed out");
                failed(FailureReason::TimedOut)
            }
            Ok(Err(err)) => {
                tracing::warn!(image_key = %request.image_key, face_index, %err, "association write failed");
                failed(FailureReason::WriteFailed)
            }
            Ok(Ok(())) => {
                tracing::debug!(
                    image_key = %request.image_key,
                    face_index,
                    identity_id = %identity_id,
                    "face persisted"
                );
                FaceOutcome::Persisted {
                    face_index,
                    identity_id,
                }
            }
        }
    }

    /// Resolve a thumbnail to an identity: search, then enroll under the
    /// single-flight lock with a second search.
    ///
    /// Match-then-enroll is not atomic at the service, so two concurrent
    /// resolutions of the same underlying face could both miss and both
    /// enroll. Serializing the decision and re-searching under the lock
    /// guarantees one minted identity per face within this process.
    async fn resolve_identity(
        &self,
        thumbnail: &[u8],
        external_ref: &str,
    ) -> Result<String, ResolveError> {
        if let Some(found) = self.search_once(thumbnail).await? {
            return Ok(found);
        }

        let _guard = self.enroll_lock.lock().await;
        if let Some(found) = self.search_once(thumbnail).await? {
            tracing::debug!(external_ref, "identity enrolled by a concurrent caller");
            return Ok(found);
        }

        let enrollment = self
            .recognition
            .enroll(thumbnail, &self.options.collection, external_ref);
        match timeout(self.options.call_timeout, enrollment).await {
            Err(_) => Err(ResolveError::TimedOut),
            Ok(Err(err)) => Err(ResolveError::Recognition(err)),
            Ok(Ok(identity)) => {
                tracing::info!(
                    identity_id = %identity.identity_id,
                    external_ref,
                    "new identity enrolled"
                );
                Ok(identity.identity_id)
            }
        }
    }

    /// One similarity search. `InvalidInput` from the service means the
    /// thumbnail is unsuitable for matching and counts as a no-match.
    async fn search_once(&self, thumbnail: &[u8]) -> Result<Option<String>, ResolveError> {
        let search = self.recognition.search_similar(
            thumbnail,
            &self.options.collection,
            SIMILARITY_THRESHOLD,
            MAX_SEARCH_RESULTS,
        );
        match timeout(self.options.call_timeout, search).await {
            Err(_) => Err(ResolveError::TimedOut),
            Ok(Err(RecognitionError::InvalidInput(reason))) => {
                tracing::debug!(%reason, "search rejected input; treating as no match");
                Ok(None)
            }
            Ok(Err(err)) => Err(ResolveError::Recognition(err)),
            Ok(Ok(matches)) => Ok(matches.into_iter().next().map(|m| m.identity_id)),
        }
    }
}

/// Deterministic thumbnail id for `(image_key, face_index)`: a retry of the
/// same face reuses the same object key instead of minting a fresh one.
fn thumbnail_id(image_key: &str, face_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_key.as_bytes());
    hasher.update(b"/");
    hasher.update(face_index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
