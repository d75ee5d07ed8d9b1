use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite association database.
    pub db_path: PathBuf,
    /// Directory backing the local object store.
    pub object_dir: PathBuf,
    /// Base URL under which stored objects are addressable.
    pub public_url: String,
    /// Base URL of the face recognition service.
    pub recognition_url: String,
    /// Recognition collection holding the enrolled identities.
    pub collection: String,
    /// Timeout in seconds applied to every external call.
    pub call_timeout_secs: u64,
    /// Upper bound on concurrently processed faces within one image.
    pub max_parallel_faces: usize,
    /// Images that may wait for admission to the engine.
    pub queue_depth: usize,
}

impl Config {
    /// Load configuration from `FACELINK_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facelink");

        let db_path = std::env::var("FACELINK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("associations.db"));

        let object_dir = std::env::var("FACELINK_OBJECT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("objects"));

        let public_url = std::env::var("FACELINK_PUBLIC_URL")
            .unwrap_or_else(|_| format!("file://{}", object_dir.display()));

        Self {
            db_path,
            object_dir,
            public_url,
            recognition_url: std::env::var("FACELINK_RECOGNITION_URL")
                .unwrap_or_else(|_| "http://localhost:7200".to_string()),
            collection: std::env::var("FACELINK_COLLECTION")
                .unwrap_or_else(|_| "faces".to_string()),
            call_timeout_secs: env_u64("FACELINK_CALL_TIMEOUT_SECS", 10),
            max_parallel_faces: env_usize("FACELINK_MAX_PARALLEL_FACES", 4),
            queue_depth: env_usize("FACELINK_QUEUE_DEPTH", 4),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
