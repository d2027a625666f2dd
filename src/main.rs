use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mixtape_server::config::{self, DEFAULT_PUBLIC_HOST, DEFAULT_REQUESTER_HEADER};
use mixtape_server::merge::{AudioEngine, FfmpegEngine};
use mixtape_server::server::{build_state, metrics, run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Root directory for generated media (artwork and audio subdirectories).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub media_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = config::DEFAULT_PORT)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Directory for per-request scratch files. Defaults to a subdirectory of the system temp dir.
    #[clap(long, value_parser = parse_path)]
    pub temp_dir: Option<PathBuf>,

    /// Maximum size in bytes of a single uploaded file.
    #[clap(long, default_value_t = config::DEFAULT_MAX_UPLOAD_SIZE)]
    pub max_upload_size: u64,

    /// Header carrying the requesting user's display name.
    #[clap(long, default_value = DEFAULT_REQUESTER_HEADER)]
    pub requester_header: String,

    /// Host used in generated URLs when a request has no Host header.
    #[clap(long, default_value = DEFAULT_PUBLIC_HOST)]
    pub public_host: String,

    /// Path to the ffmpeg binary.
    #[clap(long, default_value = config::DEFAULT_FFMPEG_PATH)]
    pub ffmpeg_path: String,

    /// Maximum number of merges rendered at the same time.
    #[clap(long, default_value_t = config::DEFAULT_MAX_CONCURRENT_JOBS)]
    pub max_concurrent_jobs: usize,

    /// Seconds a single merge may run before it is killed.
    #[clap(long, default_value_t = config::DEFAULT_JOB_TIMEOUT_SEC)]
    pub job_timeout_sec: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            media_path: args.media_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            temp_dir: args.temp_dir.clone(),
            max_upload_size: args.max_upload_size,
            requester_header: args.requester_header.clone(),
            public_host: args.public_host.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            max_concurrent_jobs: args.max_concurrent_jobs,
            job_timeout_sec: args.job_timeout_sec,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  media_path: {:?}", app_config.media_path);
    info!("  images: {:?}", app_config.media.images_dir);
    info!("  audio: {:?}", app_config.media.audio_dir);
    info!("  temp_dir: {:?}", app_config.temp_dir);
    info!("  port: {}", app_config.port);

    info!("Initializing metrics...");
    metrics::init_metrics();

    let engine = FfmpegEngine::new(
        &app_config.engine.ffmpeg_path,
        app_config.engine.max_concurrent_jobs,
        app_config.engine.job_timeout,
    );
    // Uploads still work without ffmpeg, only merges fail.
    match engine.check_available().await {
        Ok(()) => info!(
            "Using {:?} with up to {} concurrent jobs",
            app_config.engine.ffmpeg_path, app_config.engine.max_concurrent_jobs
        ),
        Err(e) => warn!(
            "ffmpeg is not usable at {:?}, merges will fail: {}",
            app_config.engine.ffmpeg_path, e
        ),
    }
    let engine: Arc<dyn AudioEngine> = Arc::new(engine);

    let state = build_state(&app_config, engine).await?;
    run_server(state).await
}
