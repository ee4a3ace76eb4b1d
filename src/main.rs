use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scenario_cutter::{
    config::Config,
    pipeline::{PlannedSegment, SegmentPlan, SegmentationEngine},
    server::{create_router, AppState},
    video::{FfmpegTools, FrameReader},
};

#[derive(Parser)]
#[command(
    name = "scenario-cutter",
    version,
    about = "Cut scenario segments out of uploaded videos",
    long_about = "Scenario-Cutter decodes an uploaded video, analyzes its frames for scene changes and brightness, and exports the most relevant stretch for a named scenario as a standalone clip."
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP upload service
    Serve {
        /// Configuration file (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address, overrides the configuration
        #[arg(long)]
        host: Option<String>,

        /// Bind port, overrides the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Export a frame range of a local video
    Cut {
        /// Source video
        #[arg(short, long)]
        input: PathBuf,

        /// Scenario name, used for the output file name
        #[arg(short, long)]
        scenario: String,

        /// First frame to export
        #[arg(long, default_value_t = 0)]
        start: u64,

        /// Frame to stop before; defaults to the end of the video
        #[arg(long)]
        end: Option<u64>,

        /// Directory for the exported clip
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<f64>,

        /// Configuration file (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print probed metadata of a video as JSON
    Probe {
        /// Video to inspect
        #[arg(short, long)]
        input: PathBuf,

        /// Also save the first frame as a PNG
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Configuration file (optional), for the ffmpeg/ffprobe paths
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Serve { config, host, port } => {
            let mut config = load_config(config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Cut {
            input,
            scenario,
            start,
            end,
            output_dir,
            fps,
            config,
        } => {
            let mut config = load_config(config)?;
            if let Some(dir) = output_dir {
                config.storage.output_dir = dir;
            }
            if let Some(fps) = fps {
                config.video.params.fps = fps;
            }
            config.validate()?;

            let plan = SegmentPlan::single(PlannedSegment::explicit(
                scenario,
                start,
                end.unwrap_or(u64::MAX),
            )?);
            cut(config, input, plan).await
        }
        Command::Probe { input, snapshot, config } => inspect(input, snapshot, config),
    }
}

/// Print stream metadata, optionally saving frame 0
fn inspect(input: PathBuf, snapshot: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let reader = FrameReader::new(FfmpegTools::from_config(&config.video));
    let metadata = reader.probe(&input)?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);

    if let Some(path) = snapshot {
        let first = reader
            .open(&input)?
            .next()
            .transpose()?
            .context("video contains no frames")?;
        first
            .save_png(&path)
            .with_context(|| format!("writing {:?}", path))?;
        info!("Saved frame 0 to {:?}", path);
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Ok(Config::from_file(&config_path)?)
        }
        None => {
            info!("Using default configuration");
            Ok(Config::default())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    config.validate()?;

    info!("Starting Scenario-Cutter v{}", env!("CARGO_PKG_VERSION"));
    info!("Uploads: {:?}", config.storage.upload_dir);
    info!("Exports: {:?}", config.storage.output_dir);
    info!("Concurrent jobs: {}", config.server.max_concurrent_jobs);

    tokio::fs::create_dir_all(&config.storage.upload_dir)
        .await
        .with_context(|| format!("creating {:?}", config.storage.upload_dir))?;
    tokio::fs::create_dir_all(&config.storage.output_dir)
        .await
        .with_context(|| format!("creating {:?}", config.storage.output_dir))?;

    if !FfmpegTools::from_config(&config.video).check_available() {
        warn!("ffmpeg/ffprobe not found; uploads will fail with ToolUnavailable");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, create_router(AppState::new(config)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn cut(config: Config, input: PathBuf, plan: SegmentPlan) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping export");
            watcher.cancel();
        }
    });

    let engine = SegmentationEngine::new(config);
    let exports = tokio::task::spawn_blocking(move || engine.export(&input, &plan, &cancel)).await??;

    for export in exports {
        info!(
            "{}: {} frames, {}x{} -> {:?}",
            export.name, export.frame_count, export.width, export.height, export.path
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
