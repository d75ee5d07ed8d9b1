//! Request/response shapes for the recognition service's JSON contract.
//!
//! Image payloads travel as standard base64. Response bodies reuse the core
//! types, which already serialize in camelCase.

use facelink_core::types::{DetectedFace, FaceMatch};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct DetectRequest {
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct DetectResponse {
    pub faces: Vec<DetectedFace>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub image: String,
    pub threshold: f32,
    pub max_results: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub matches: Vec<FaceMatch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub image: String,
    pub external_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct PurgeResponse {
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelink_core::types::BoundingBox;

    #[test]
    fn search_request_serializes_camel_case() {
        let request = SearchRequest {
            image: "aGVsbG8=".into(),
            threshold: 90.0,
            max_results: 1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["threshold"], 90.0);
        assert_eq!(json["maxResults"], 1);
    }

    #[test]
    fn detect_response_parses_bounding_boxes() {
        let body = r#"{"faces":[{"boundingBox":{"left":0.1,"top":0.2,"width":0.3,"height":0.4},"confidence":0.97}]}"#;
        let response: DetectResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.faces.len(), 1);
        let BoundingBox { left, height, .. } = response.faces[0].bounding_box;
        assert!((left - 0.1).abs() < f32::EPSILON);
        assert!((height - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn search_response_parses_matches() {
        let body = r#"{"matches":[{"identityId":"id-1","similarity":96.4}]}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.matches[0].identity_id, "id-1");
    }
}
