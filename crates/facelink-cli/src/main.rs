use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[zbus::proxy(
    interface = "dev.facelink.Facelink1",
    default_service = "dev.facelink.Facelink1",
    default_path = "/dev/facelink/Facelink1"
)]
trait Facelink {
    async fn ingest(&self, path: &str) -> zbus::Result<String>;
    async fn images(&self) -> zbus::Result<String>;
    async fn identities(&self) -> zbus::Result<String>;
    async fn identity_images(&self, identity_id: &str) -> zbus::Result<String>;
    async fn image_faces(&self, image_key: &str) -> zbus::Result<String>;
    async fn purge(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facelink", about = "Facelink face-association CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest image files: detect faces, resolve identities, persist
    /// associations
    Ingest {
        /// Image files to process
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List stored images
    Images,
    /// List known identities
    Identities,
    /// List every image a given identity appears in
    Identity {
        /// Identity ID
        id: String,
    },
    /// List every identity appearing in a given image
    Image {
        /// Image key returned by ingest
        key: String,
    },
    /// Delete all associations and enrolled identities
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("connecting to the session bus (is facelinkd running?)")?;
    let proxy = FacelinkProxy::new(&conn).await?;

    match cli.command {
        Commands::Ingest { paths } => {
            for path in paths {
                let path = path
                    .canonicalize()
                    .with_context(|| format!("resolving {}", path.display()))?;
                let report = proxy
                    .ingest(&path.to_string_lossy())
                    .await
                    .with_context(|| format!("ingesting {}", path.display()))?;
                print_json(&report)?;
            }
        }
        Commands::Images => print_json(&proxy.images().await?)?,
        Commands::Identities => print_json(&proxy.identities().await?)?,
        Commands::Identity { id } => print_json(&proxy.identity_images(&id).await?)?,
        Commands::Image { key } => print_json(&proxy.image_faces(&key).await?)?,
        Commands::Purge { yes } => {
            if !yes {
                bail!("purge removes every association and enrolled identity; re-run with --yes");
            }
            print_json(&proxy.purge().await?)?;
        }
        Commands::Status => print_json(&proxy.status().await?)?,
    }

    Ok(())
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("parsing daemon reply")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
