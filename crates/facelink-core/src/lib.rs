//! facelink-core — face→identity association pipeline.
//!
//! Detects faces in an uploaded image, extracts a per-face thumbnail,
//! resolves each face to an enrolled identity (or enrolls a new one), and
//! persists an identity↔image association. The external collaborators —
//! recognition service, object store, mapping store — are capability traits
//! injected into the pipeline.

pub mod capability;
pub mod engine;
pub mod geometry;
pub mod pipeline;
pub mod thumbnail;
pub mod types;

pub use capability::{FaceRecognition, MappingStore, ObjectStore};
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use pipeline::{FacePipeline, ImageRequest, PipelineError, PipelineOptions};
pub use types::{
    AssociationRecord, BoundingBox, DetectedFace, FaceFailure, FailureReason, PipelineResult,
    PixelRegion,
};
