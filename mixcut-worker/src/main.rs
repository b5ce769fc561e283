//! mixcut-worker - Audio splitting worker
//!
//! Creates and starts jobs, and runs the queue worker that cuts a recording
//! into tagged tracks according to its CUE sheet.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mixcut_common::config::WorkerConfig;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use mixcut_worker::stages::{JobService, StageOutcome};
use mixcut_worker::worker::Worker;
use mixcut_worker::StageContext;

/// Command-line arguments for mixcut-worker
#[derive(Parser, Debug)]
#[command(name = "mixcut-worker")]
#[command(about = "Split a recording into tagged tracks using its CUE sheet")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MIXCUT_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "MIXCUT_DATABASE")]
    database: Option<PathBuf>,

    /// Object store root directory
    #[arg(long, env = "MIXCUT_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Parent directory for per-job workspaces
    #[arg(long, env = "MIXCUT_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Bucket that receives cut tracks
    #[arg(long, env = "MIXCUT_OUTPUTS_BUCKET")]
    outputs_bucket: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a job and print the keys to upload its files to
    Create {
        /// Artwork file extension (png, jpg or jpeg) if artwork will be uploaded
        #[arg(long)]
        artwork_ext: Option<String>,
    },
    /// Validate an uploaded job and queue it for processing
    Start { job_id: Uuid },
    /// Print a job and its tracks as JSON
    Status { job_id: Uuid },
    /// Zip a completed job's tracks into one archive
    Bundle { job_id: Uuid },
    /// Process queued jobs until interrupted
    Work {
        /// Jobs processed in parallel
        #[arg(long, env = "MIXCUT_MAX_CONCURRENT_JOBS")]
        max_concurrent_jobs: Option<usize>,
    },
}

impl Args {
    /// Config file values overridden by flags and environment
    fn resolve_config(&self) -> Result<WorkerConfig> {
        let mut config =
            WorkerConfig::load(self.config.as_deref()).context("Failed to load configuration")?;

        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        if let Some(path) = &self.storage_root {
            config.storage_root = path.clone();
        }
        if let Some(path) = &self.workspace_root {
            config.workspace_root = path.clone();
        }
        if let Some(bucket) = &self.outputs_bucket {
            config.outputs_bucket = bucket.clone();
        }
        if let Command::Work {
            max_concurrent_jobs: Some(n),
        } = &self.command
        {
            config.max_concurrent_jobs = *n;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixcut_worker=info,mixcut_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    info!("mixcut-worker {}", env!("CARGO_PKG_VERSION"));

    let ctx = StageContext::open(config)
        .await
        .context("Failed to open stores")?;

    match args.command {
        Command::Create { artwork_ext } => {
            let job = JobService::new(ctx)
                .create_job(artwork_ext.as_deref())
                .await
                .context("Failed to create job")?;
            println!("job_id: {}", job.id);
            println!("audio:  {}", job.audio);
            println!("cue:    {}", job.cue);
            if let Some(artwork) = &job.artwork {
                println!("artwork: {}", artwork);
            }
        }
        Command::Start { job_id } => {
            let outcome = JobService::new(ctx)
                .start_job(job_id)
                .await
                .with_context(|| format!("Failed to start job {}", job_id))?;
            match outcome {
                StageOutcome::Failed(message) => anyhow::bail!("Validation failed: {}", message),
                _ => println!("Job {} queued", job_id),
            }
        }
        Command::Status { job_id } => {
            let report = JobService::new(ctx)
                .job_status(job_id)
                .await
                .with_context(|| format!("Failed to load job {}", job_id))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Bundle { job_id } => {
            let bundle = JobService::new(ctx)
                .bundle_job(job_id)
                .await
                .with_context(|| format!("Failed to bundle job {}", job_id))?;
            println!("bundle: {}", bundle);
        }
        Command::Work { .. } => {
            let shutdown = CancellationToken::new();
            let worker = Worker::new(ctx);

            let trigger = shutdown.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                info!("Shutdown signal received, finishing in-flight jobs");
                trigger.cancel();
            });

            worker.run(shutdown).await;
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
