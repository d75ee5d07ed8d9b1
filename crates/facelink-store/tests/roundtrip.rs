//! Cross-crate round trip: process an image through the full pipeline
//! against real store adapters, then read the associations back.

use async_trait::async_trait;
use chrono::Utc;
use facelink_core::capability::{FaceRecognition, MappingStore, RecognitionError};
use facelink_core::pipeline::{FacePipeline, ImageRequest, PipelineOptions};
use facelink_core::types::{BoundingBox, DetectedFace, FaceMatch, Identity};
use facelink_store::{InMemoryMappingStore, InMemoryObjectStore, SqliteMappingStore};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Enrolls every unseen thumbnail; matches once something is enrolled.
struct OneShotRecognition {
    faces: Vec<DetectedFace>,
    enroll_calls: AtomicUsize,
    enrolled: Mutex<Vec<Identity>>,
}

impl OneShotRecognition {
    fn new(faces: Vec<DetectedFace>) -> Self {
        Self {
            faces,
            enroll_calls: AtomicUsize::new(0),
            enrolled: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FaceRecognition for OneShotRecognition {
    async fn detect_faces(&self, _image: &[u8]) -> Result<Vec<DetectedFace>, RecognitionError> {
        Ok(self.faces.clone())
    }

    async fn search_similar(
        &self,
        _thumbnail: &[u8],
        _collection: &str,
        _threshold: f32,
        _max_results: u32,
    ) -> Result<Vec<FaceMatch>, RecognitionError> {
        let enrolled = self.enrolled.lock().unwrap();
        Ok(enrolled
            .first()
            .map(|identity| FaceMatch {
                identity_id: identity.identity_id.clone(),
                similarity: 97.5,
            })
            .into_iter()
            .collect())
    }

    async fn enroll(
        &self,
        _thumbnail: &[u8],
        _collection: &str,
        external_ref: &str,
    ) -> Result<Identity, RecognitionError> {
        let n = self.enroll_calls.fetch_add(1, Ordering::SeqCst);
        let identity = Identity {
            identity_id: format!("identity-{n}"),
            external_ref: external_ref.to_string(),
        };
        self.enrolled.lock().unwrap().push(identity.clone());
        Ok(identity)
    }

    async fn purge(&self, _collection: &str) -> Result<u64, RecognitionError> {
        let mut enrolled = self.enrolled.lock().unwrap();
        let n = enrolled.len() as u64;
        enrolled.clear();
        Ok(n)
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 7])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn face(left: f32, top: f32, width: f32, height: f32) -> DetectedFace {
    DetectedFace {
        bounding_box: BoundingBox {
            left,
            top,
            width,
            height,
        },
        confidence: 0.98,
    }
}

fn request(image_key: &str, width: u32, height: u32) -> ImageRequest {
    ImageRequest {
        image_key: image_key.to_string(),
        bytes: Arc::new(png_bytes(width, height)),
        width,
        height,
        stored_at: Utc::now(),
    }
}

#[tokio::test]
async fn queries_return_exactly_the_resolved_identities() {
    let recognition = Arc::new(OneShotRecognition::new(vec![face(0.1, 0.1, 0.3, 0.3)]));
    let objects = Arc::new(InMemoryObjectStore::new());
    let mappings = Arc::new(InMemoryMappingStore::new());
    let pipeline = FacePipeline::new(
        recognition,
        objects.clone(),
        mappings.clone(),
        PipelineOptions::default(),
    );

    let req = request("upload-1.png", 100, 100);
    let result = pipeline.process_image(&req).await.unwrap();
    assert_eq!(result.persisted_count, 1);

    let stored: Vec<String> = mappings
        .query_by_image("upload-1.png")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.identity_id)
        .collect();
    assert_eq!(stored, result.identity_ids);

    // The thumbnail the association references is the uploaded object.
    let records = mappings.query_by_image("upload-1.png").await.unwrap();
    let key = records[0]
        .thumbnail_url
        .strip_prefix("mem://")
        .unwrap()
        .to_string();
    let thumb = objects.get(&key).await.expect("thumbnail uploaded");
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (30, 30));
}

#[tokio::test]
async fn second_image_of_the_same_person_reuses_the_identity() {
    let recognition = Arc::new(OneShotRecognition::new(vec![face(0.2, 0.2, 0.4, 0.4)]));
    let objects = Arc::new(InMemoryObjectStore::new());
    let mappings = Arc::new(InMemoryMappingStore::new());
    let pipeline = FacePipeline::new(
        recognition.clone(),
        objects,
        mappings.clone(),
        PipelineOptions::default(),
    );

    let first = pipeline.process_image(&request("a.png", 100, 100)).await.unwrap();
    let second = pipeline.process_image(&request("b.png", 100, 100)).await.unwrap();

    assert_eq!(first.identity_ids, second.identity_ids);
    assert_eq!(recognition.enroll_calls.load(Ordering::SeqCst), 1);

    let images = mappings.query_by_identity(&first.identity_ids[0]).await.unwrap();
    let keys: Vec<&str> = images.iter().map(|r| r.image_key.as_str()).collect();
    assert_eq!(keys, vec!["a.png", "b.png"]);
}

#[tokio::test]
async fn sqlite_store_round_trips_through_the_pipeline() {
    let recognition = Arc::new(OneShotRecognition::new(vec![face(0.1, 0.1, 0.3, 0.3)]));
    let objects = Arc::new(InMemoryObjectStore::new());
    let mappings = Arc::new(SqliteMappingStore::open_in_memory().await.unwrap());
    let pipeline = FacePipeline::new(
        recognition,
        objects,
        mappings.clone(),
        PipelineOptions::default(),
    );

    let result = pipeline
        .process_image(&request("upload-2.png", 100, 100))
        .await
        .unwrap();

    let stored: Vec<String> = mappings
        .query_by_image("upload-2.png")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.identity_id)
        .collect();
    assert_eq!(stored, result.identity_ids);

    let images = mappings.list_images().await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].image_key, "upload-2.png");
    assert_eq!(images[0].identity_count, 1);
}
