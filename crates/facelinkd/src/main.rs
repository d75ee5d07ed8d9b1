use anyhow::Result;
use facelink_core::pipeline::{FacePipeline, PipelineOptions};
use facelink_recog::HttpRecognition;
use facelink_store::{FsObjectStore, SqliteMappingStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;

use config::Config;
use dbus_interface::FacelinkService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facelinkd starting");

    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mappings: Arc<SqliteMappingStore> = Arc::new(SqliteMappingStore::open(&config.db_path).await?);
    let objects: Arc<FsObjectStore> =
        Arc::new(FsObjectStore::new(&config.object_dir, &config.public_url)?);
    let recognition: Arc<HttpRecognition> = Arc::new(HttpRecognition::new(&config.recognition_url)?);
    tracing::info!(
        recognition_url = %config.recognition_url,
        collection = %config.collection,
        object_dir = %config.object_dir.display(),
        "external collaborators wired"
    );

    let pipeline = Arc::new(FacePipeline::new(
        recognition.clone(),
        objects.clone(),
        mappings.clone(),
        PipelineOptions {
            collection: config.collection.clone(),
            call_timeout: config.call_timeout(),
            max_parallel_faces: config.max_parallel_faces,
        },
    ));
    let engine = facelink_core::spawn_engine(pipeline, config.queue_depth);

    let service = FacelinkService::new(
        engine,
        objects,
        mappings,
        recognition,
        config.collection.clone(),
    );
    let _conn = zbus::connection::Builder::session()?
        .name("dev.facelink.Facelink1")?
        .serve_at("/dev/facelink/Facelink1", service)?
        .build()
        .await?;

    tracing::info!("facelinkd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facelinkd shutting down");

    Ok(())
}
