//! facelink-recog — HTTP adapter for the external face recognition service.
//!
//! Speaks a small JSON contract: whole-image detection, similarity search
//! and enrollment against a named collection. The service's
//! "input unsuitable for matching" rejection is surfaced as
//! `RecognitionError::InvalidInput` so the pipeline can treat it as a
//! no-match rather than a failure.

mod http;
mod wire;

pub use http::HttpRecognition;
