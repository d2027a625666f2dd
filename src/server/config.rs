use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// Host used in generated URLs when a request has no Host header.
    pub public_host: String,
    /// Header carrying the requester's display name, set by the auth gateway.
    pub requester_header: String,
    pub max_upload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            public_host: "localhost:3001".to_string(),
            requester_header: "x-user-name".to_string(),
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}
