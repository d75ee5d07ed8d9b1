//! Engine task: a bounded request queue in front of the pipeline.
//!
//! Callers hold a clone-safe [`EngineHandle`], enqueue an image and await a
//! oneshot reply. Each admitted image runs on its own task; if the caller
//! goes away the image's in-flight work is cancelled cooperatively.

use crate::pipeline::{FacePipeline, ImageRequest, PipelineError};
use crate::types::PipelineResult;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("engine task exited")]
    ChannelClosed,
}

enum EngineRequest {
    Process {
        request: ImageRequest,
        reply: oneshot::Sender<Result<PipelineResult, PipelineError>>,
    },
}

/// Clone-safe handle to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Process one image through the full pipeline.
    pub async fn process(&self, request: ImageRequest) -> Result<PipelineResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Process {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        match reply_rx.await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::ChannelClosed),
        }
    }
}

/// Spawn the engine task over `pipeline`.
///
/// `queue_depth` bounds how many images may wait for admission; admitted
/// images each run on their own task, so independent uploads never block
/// one another.
pub fn spawn_engine(pipeline: Arc<FacePipeline>, queue_depth: usize) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth.max(1));

    tokio::spawn(async move {
        tracing::info!("engine task started");
        while let Some(req) = rx.recv().await {
            let EngineRequest::Process { request, mut reply } = req;
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                tokio::select! {
                    _ = reply.closed() => {
                        tracing::debug!(image_key = %request.image_key, "caller went away; image cancelled");
                    }
                    result = pipeline.process_image(&request) => {
                        let _ = reply.send(result);
                    }
                }
            });
        }
        tracing::info!("engine task exiting");
    });

    EngineHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        FaceRecognition, MappingStore, MappingStoreError, ObjectStore, ObjectStoreError,
        RecognitionError,
    };
    use crate::pipeline::PipelineOptions;
    use crate::types::{
        AssociationRecord, DetectedFace, FaceMatch, Identity, IdentitySummary, ImageSummary,
    };
    use async_trait::async_trait;
    use chrono::Utc;

    struct NoFaces;

    #[async_trait]
    impl FaceRecognition for NoFaces {
        async fn detect_faces(&self, _image: &[u8]) -> Result<Vec<DetectedFace>, RecognitionError> {
            Ok(Vec::new())
        }

        async fn search_similar(
            &self,
            _thumbnail: &[u8],
            _collection: &str,
            _threshold: f32,
            _max_results: u32,
        ) -> Result<Vec<FaceMatch>, RecognitionError> {
            Ok(Vec::new())
        }

        async fn enroll(
            &self,
            _thumbnail: &[u8],
            _collection: &str,
            external_ref: &str,
        ) -> Result<Identity, RecognitionError> {
            Ok(Identity {
                identity_id: "identity-0".into(),
                external_ref: external_ref.into(),
            })
        }

        async fn purge(&self, _collection: &str) -> Result<u64, RecognitionError> {
            Ok(0)
        }
    }

    struct NullStore;

    #[async_trait]
    impl ObjectStore for NullStore {
        async fn put(
            &self,
            key: &str,
            _bytes: &[u8],
            _content_type: &str,
        ) -> Result<String, ObjectStoreError> {
            Ok(format!("mem://{key}"))
        }
    }

    #[async_trait]
    impl MappingStore for NullStore {
        async fn upsert(&self, _record: &AssociationRecord) -> Result<(), MappingStoreError> {
            Ok(())
        }

        async fn query_by_identity(
            &self,
            _identity_id: &str,
        ) -> Result<Vec<AssociationRecord>, MappingStoreError> {
            Ok(Vec::new())
        }

        async fn query_by_image(
            &self,
            _image_key: &str,
        ) -> Result<Vec<AssociationRecord>, MappingStoreError> {
            Ok(Vec::new())
        }

        async fn list_images(&self) -> Result<Vec<ImageSummary>, MappingStoreError> {
            Ok(Vec::new())
        }

        async fn list_identities(&self) -> Result<Vec<IdentitySummary>, MappingStoreError> {
            Ok(Vec::new())
        }

        async fn purge(&self) -> Result<u64, MappingStoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn handle_round_trips_a_request() {
        let pipeline = Arc::new(FacePipeline::new(
            Arc::new(NoFaces),
            Arc::new(NullStore),
            Arc::new(NullStore),
            PipelineOptions::default(),
        ));
        let engine = spawn_engine(pipeline, 4);

        let result = engine
            .process(ImageRequest {
                image_key: "img.png".into(),
                bytes: Arc::new(Vec::new()),
                width: 100,
                height: 100,
                stored_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(result.face_count, 0);
        assert_eq!(result.persisted_count, 0);
    }

    #[tokio::test]
    async fn handles_survive_cloning() {
        let pipeline = Arc::new(FacePipeline::new(
            Arc::new(NoFaces),
            Arc::new(NullStore),
            Arc::new(NullStore),
            PipelineOptions::default(),
        ));
        let engine = spawn_engine(pipeline, 1);
        let other = engine.clone();

        let req = ImageRequest {
            image_key: "img.png".into(),
            bytes: Arc::new(Vec::new()),
            width: 10,
            height: 10,
            stored_at: Utc::now(),
        };
        let (a, b) = tokio::join!(engine.process(req.clone()), other.process(req));
        assert!(a.is_ok() && b.is_ok());
    }
}
