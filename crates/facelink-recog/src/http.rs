//! reqwest-based implementation of the `FaceRecognition` capability.

use crate::wire::{
    DetectRequest, DetectResponse, EnrollRequest, ErrorBody, PurgeResponse, SearchRequest,
    SearchResponse,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use facelink_core::capability::{FaceRecognition, RecognitionError};
use facelink_core::types::{DetectedFace, FaceMatch, Identity};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct HttpRecognition {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecognition {
    pub fn new(base_url: &str) -> Result<Self, RecognitionError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| RecognitionError::Service(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, RecognitionError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| RecognitionError::Service(err.to_string()))?;
        decode(response).await
    }
}

/// Success bodies parse as `T`; 422 is the service's "input unsuitable for
/// matching" rejection and maps to `InvalidInput`, everything else to
/// `Service`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RecognitionError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|err| RecognitionError::Service(format!("malformed response: {err}")));
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| status.to_string());
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        Err(RecognitionError::InvalidInput(message))
    } else {
        Err(RecognitionError::Service(message))
    }
}

#[async_trait]
impl FaceRecognition for HttpRecognition {
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, RecognitionError> {
        let request = DetectRequest {
            image: BASE64.encode(image),
        };
        let response: DetectResponse = self.post("/detect", &request).await?;
        tracing::debug!(faces = response.faces.len(), "detection response");
        Ok(response.faces)
    }

    async fn search_similar(
        &self,
        thumbnail: &[u8],
        collection: &str,
        threshold: f32,
        max_results: u32,
    ) -> Result<Vec<FaceMatch>, RecognitionError> {
        let request = SearchRequest {
            image: BASE64.encode(thumbnail),
            threshold,
            max_results,
        };
        let response: SearchResponse = self
            .post(&format!("/collections/{collection}/search"), &request)
            .await?;
        Ok(response.matches)
    }

    async fn enroll(
        &self,
        thumbnail: &[u8],
        collection: &str,
        external_ref: &str,
    ) -> Result<Identity, RecognitionError> {
        let request = EnrollRequest {
            image: BASE64.encode(thumbnail),
            external_ref: external_ref.to_string(),
        };
        self.post(&format!("/collections/{collection}/identities"), &request)
            .await
    }

    async fn purge(&self, collection: &str) -> Result<u64, RecognitionError> {
        let url = format!("{}/collections/{collection}/identities", self.base_url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|err| RecognitionError::Service(err.to_string()))?;
        let purged: PurgeResponse = decode(response).await?;
        Ok(purged.removed)
    }
}
