use anyhow::{Context, Result};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::info;

use crate::config::AppConfig;
use crate::ingestion::{FileHandler, IngestionHandler};
use crate::merge::{AudioEngine, MergeOrchestrator};
use tower_http::services::ServeDir;

use axum::{
    extract::State, middleware, response::IntoResponse, routing::get, Json, Router,
};
use serde::Serialize;

use super::{
    log_requests, metrics::metrics_handler, state::*, track_routes::make_track_routes,
    ServerConfig,
};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        layout: GuardedMediaLayout,
        file_handler: GuardedFileHandler,
        engine: Arc<dyn AudioEngine>,
        placeholder_cover_url: String,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_owned(),
            ingestion: IngestionHandler::new(file_handler.clone(), layout.clone()),
            merger: MergeOrchestrator::new(engine, layout.clone(), placeholder_cover_url),
            layout,
            file_handler,
        }
    }
}

/// Builds the server state from the resolved configuration and creates the
/// media and temp directories.
pub async fn build_state(config: &AppConfig, engine: Arc<dyn AudioEngine>) -> Result<ServerState> {
    let layout = Arc::new(config.media.layout());
    layout
        .init()
        .await
        .with_context(|| format!("Failed to create media directories under {:?}", config.media_path))?;

    let file_handler = Arc::new(FileHandler::new(
        &config.temp_dir,
        layout.audio_dir(),
        config.max_upload_size,
    ));
    file_handler
        .init()
        .await
        .with_context(|| format!("Failed to create temp directory {:?}", config.temp_dir))?;

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        public_host: config.media.public_host.clone(),
        requester_header: config.requester_header.clone(),
        max_upload_size: config.max_upload_size,
    };

    Ok(ServerState::new(
        server_config,
        layout,
        file_handler,
        engine,
        config.media.placeholder_cover_url.clone(),
    ))
}

pub fn make_app(state: ServerState) -> Router {
    let track_routes = make_track_routes(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    let mut app: Router = home_router
        .nest("/v1/tracks", track_routes)
        .nest_service(
            state.layout.image_url_prefix(),
            ServeDir::new(state.layout.images_dir()),
        )
        .nest_service(
            state.layout.audio_url_prefix(),
            ServeDir::new(state.layout.audio_dir()),
        );

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    app
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);
    Ok(axum::serve(listener, app).await?)
}
