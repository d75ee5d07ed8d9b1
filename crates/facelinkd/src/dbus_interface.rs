use anyhow::Context;
use chrono::Utc;
use facelink_core::capability::{FaceRecognition, MappingStore, ObjectStore};
use facelink_core::pipeline::ImageRequest;
use facelink_core::types::PipelineResult;
use facelink_core::EngineHandle;
use serde::Serialize;
use std::fmt::Display;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;
use zbus::interface;

/// D-Bus interface for the facelink daemon.
///
/// Bus name: dev.facelink.Facelink1
/// Object path: /dev/facelink/Facelink1
///
/// All methods reply with JSON strings; the surrounding transport layer is
/// expected to relay them untouched.
pub struct FacelinkService {
    engine: EngineHandle,
    objects: Arc<dyn ObjectStore>,
    mappings: Arc<dyn MappingStore>,
    recognition: Arc<dyn FaceRecognition>,
    collection: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestReport {
    image_key: String,
    image_url: String,
    #[serde(flatten)]
    result: PipelineResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeReport {
    associations_removed: u64,
    identities_removed: u64,
}

impl FacelinkService {
    pub fn new(
        engine: EngineHandle,
        objects: Arc<dyn ObjectStore>,
        mappings: Arc<dyn MappingStore>,
        recognition: Arc<dyn FaceRecognition>,
        collection: String,
    ) -> Self {
        Self {
            engine,
            objects,
            mappings,
            recognition,
            collection,
        }
    }

    /// Read the file, store the original, run the pipeline.
    async fn ingest_path(&self, path: &Path) -> anyhow::Result<IngestReport> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .context("probing image format")?
            .into_dimensions()
            .context("reading image dimensions")?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        let image_key = format!("{}{extension}", Uuid::new_v4());

        let image_url = self
            .objects
            .put(&image_key, &bytes, content_type_for(&extension))
            .await?;
        tracing::info!(image_key = %image_key, size = bytes.len(), "original image stored");

        let result = self
            .engine
            .process(ImageRequest {
                image_key: image_key.clone(),
                bytes: Arc::new(bytes),
                width,
                height,
                stored_at: Utc::now(),
            })
            .await?;

        Ok(IngestReport {
            image_key,
            image_url,
            result,
        })
    }
}

#[interface(name = "dev.facelink.Facelink1")]
impl FacelinkService {
    /// Ingest one image file: store it, detect faces, resolve identities,
    /// persist associations. Returns the pipeline report as JSON.
    async fn ingest(&self, path: &str) -> zbus::fdo::Result<String> {
        tracing::info!(path, "ingest requested");
        let report = self.ingest_path(Path::new(path)).await.map_err(failed)?;
        to_json(&report)
    }

    /// All stored images, most recent first.
    async fn images(&self) -> zbus::fdo::Result<String> {
        let images = self.mappings.list_images().await.map_err(failed)?;
        to_json(&images)
    }

    /// All known identities with a sample thumbnail and image count.
    async fn identities(&self) -> zbus::fdo::Result<String> {
        let identities = self.mappings.list_identities().await.map_err(failed)?;
        to_json(&identities)
    }

    /// Associations for one identity (every image it appears in).
    async fn identity_images(&self, identity_id: &str) -> zbus::fdo::Result<String> {
        let records = self
            .mappings
            .query_by_identity(identity_id)
            .await
            .map_err(failed)?;
        to_json(&records)
    }

    /// Associations for one image (every identity appearing in it).
    async fn image_faces(&self, image_key: &str) -> zbus::fdo::Result<String> {
        let records = self
            .mappings
            .query_by_image(image_key)
            .await
            .map_err(failed)?;
        to_json(&records)
    }

    /// Bulk purge: clear the enrolled collection first, then every
    /// association.
    async fn purge(&self) -> zbus::fdo::Result<String> {
        tracing::warn!(collection = %self.collection, "purge requested");
        let identities_removed = self
            .recognition
            .purge(&self.collection)
            .await
            .map_err(failed)?;
        let associations_removed = self.mappings.purge().await.map_err(failed)?;
        tracing::info!(identities_removed, associations_removed, "purge complete");
        to_json(&PurgeReport {
            associations_removed,
            identities_removed,
        })
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "collection": self.collection,
        })
        .to_string())
    }
}

fn failed(err: impl Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

fn to_json(value: &impl Serialize) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(failed)
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".webp" => "image/webp",
        ".gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
