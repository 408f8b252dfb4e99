//! # courier
//!
//! Command line host for the offline upload queue.
//!
//! ```text
//! courier enqueue report.pdf photo.jpg   queue files and wait for delivery
//! courier drain                          flush items left by earlier runs
//! courier status                         show the engine and pending count
//! courier config                         print the effective configuration
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use courier_core::BackendPreference;
use courier_store::open_backend;
use courier_sync::{LogEmitter, OfflineUploader, OfflineUploaderBuilder, UploaderConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Durable offline upload queue", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to courier.toml (defaults to the platform config directory)
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Restrict the persistence engine: auto, object or relational
    #[arg(long, global = true)]
    backend: Option<BackendPreference>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue files for upload, named after their file name
    Enqueue {
        /// Files to queue
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Return once the files are queued instead of waiting for delivery
        #[arg(long)]
        no_wait: bool,
    },

    /// Deliver everything currently queued
    Drain {
        /// Start the drain and return immediately
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the selected engine and pending item count
    Status,

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "info,courier=debug,sqlx=warn",
            1 => "debug,sqlx=warn",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = UploaderConfig::load(cli.config)?;
    if let Some(preference) = cli.backend {
        config.backends.preference = preference;
    }

    match cli.command {
        Commands::Enqueue { files, no_wait } => enqueue(&config, &files, no_wait).await,
        Commands::Drain { no_wait } => drain(&config, no_wait).await,
        Commands::Status => status(&config).await,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn build_uploader(config: &UploaderConfig) -> Result<OfflineUploader, Box<dyn std::error::Error>> {
    let uploader = OfflineUploaderBuilder::from_config(config)?
        .with_emitter(Arc::new(LogEmitter))
        .build()?;
    Ok(uploader)
}

/// Item name for a file: its final path component.
fn item_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

async fn enqueue(
    config: &UploaderConfig,
    files: &[PathBuf],
    no_wait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let uploader = build_uploader(config)?;
    let backend = uploader.connect().await?;
    info!(backend = %backend, endpoint = %config.endpoint.url, "Queue ready");

    let mut queued = 0usize;
    for path in files {
        let Some(name) = item_name(path) else {
            warn!(path = %path.display(), "Not a file path, skipping");
            continue;
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read file, skipping");
                continue;
            }
        };

        let key = uploader.enqueue(&name, &STANDARD.encode(&bytes)).await?;
        println!("queued {} as #{}", name, key);
        queued += 1;
    }

    if !no_wait && queued > 0 {
        wait_for_delivery(&uploader).await;
    }

    report(&uploader).await;
    uploader.disconnect().await;
    Ok(())
}

async fn drain(config: &UploaderConfig, no_wait: bool) -> Result<(), Box<dyn std::error::Error>> {
    let uploader = build_uploader(config)?;
    uploader.connect().await?;

    // connect already started a cycle; this one only runs if that finished
    if uploader.drain().await?.is_none() {
        info!("Drain already in progress");
    }

    if !no_wait {
        wait_for_delivery(&uploader).await;
    }

    report(&uploader).await;
    uploader.disconnect().await;
    Ok(())
}

/// Reads the pending count without starting a drain.
async fn status(config: &UploaderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Some(kind) = config.capabilities().select_backend() else {
        println!("backend:  none (offline queueing unavailable)");
        return Ok(());
    };

    let backend = open_backend(kind, config.store_config());
    let connection = backend.connect().await?;
    let pending = backend.len().await;
    backend.disconnect().await;

    println!("backend:  {}", kind);
    println!("store:    {}", connection.store_name);
    println!("data dir: {}", config.data_dir().display());
    println!("endpoint: {}", config.endpoint.url);
    println!("pending:  {}", pending?);
    Ok(())
}

/// Waits for the drain loop to go idle, or for Ctrl+C.
async fn wait_for_delivery(uploader: &OfflineUploader) {
    tokio::select! {
        _ = uploader.wait_idle() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Interrupted, remaining items stay queued"),
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }
    }
}

async fn report(uploader: &OfflineUploader) {
    let status = uploader.status().await;
    match status.pending {
        Some(0) => println!("queue empty"),
        Some(n) => println!("{} item(s) still queued", n),
        None => println!("pending count unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_enqueue_with_backend() {
        let cli = Cli::try_parse_from([
            "courier",
            "--backend",
            "relational",
            "enqueue",
            "a.txt",
            "b.txt",
            "--no-wait",
        ])
        .unwrap();

        assert_eq!(cli.backend, Some(BackendPreference::Relational));
        match cli.command {
            Commands::Enqueue { files, no_wait } => {
                assert_eq!(files.len(), 2);
                assert!(no_wait);
            }
            _ => panic!("expected enqueue"),
        }
    }

    #[test]
    fn test_enqueue_requires_files() {
        assert!(Cli::try_parse_from(["courier", "enqueue"]).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["courier", "--backend", "cloud", "status"]).is_err());
    }

    #[test]
    fn test_item_name_is_file_name() {
        assert_eq!(
            item_name(Path::new("/tmp/reports/q3.pdf")).as_deref(),
            Some("q3.pdf")
        );
        assert_eq!(item_name(Path::new("/")), None);
    }
}
