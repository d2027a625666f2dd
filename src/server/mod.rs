pub mod config;
mod http_layers;
pub mod metrics;
pub mod request_context;
pub mod server;
pub mod state;
mod track_routes;

pub use config::ServerConfig;
pub use http_layers::*;
pub use request_context::Requester;
pub use server::{build_state, make_app, make_metrics_app, run_server};
pub use track_routes::{
    FADE_IN_FIELD, MERGE_FILES_FIELD, PITCH_FIELD, SPEED_FIELD, UPLOAD_FILE_FIELD, VOLUME_FIELD,
};
