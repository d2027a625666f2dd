mod file_config;

pub use file_config::{EngineConfig, FileConfig, MediaConfig};

use crate::media::MediaLayout;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use axum::http::HeaderName;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_METRICS_PORT: u16 = 9091;
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_REQUESTER_HEADER: &str = "x-user-name";
pub const DEFAULT_PUBLIC_HOST: &str = "localhost:3001";
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;
pub const DEFAULT_JOB_TIMEOUT_SEC: u64 = 300;

const DEFAULT_IMAGES_DIR: &str = "images";
const DEFAULT_AUDIO_DIR: &str = "mp3";
const DEFAULT_IMAGE_URL_PREFIX: &str = "/images";
const DEFAULT_AUDIO_URL_PREFIX: &str = "/mp3";
const DEFAULT_PLACEHOLDER_COVER_URL: &str = "http://localhost:3000/assets/img/covers/cover.svg";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub temp_dir: Option<PathBuf>,
    pub max_upload_size: u64,
    pub requester_header: String,
    pub public_host: String,
    pub ffmpeg_path: String,
    pub max_concurrent_jobs: usize,
    pub job_timeout_sec: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            media_path: None,
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            logging_level: RequestsLoggingLevel::default(),
            temp_dir: None,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            requester_header: DEFAULT_REQUESTER_HEADER.to_string(),
            public_host: DEFAULT_PUBLIC_HOST.to_string(),
            ffmpeg_path: DEFAULT_FFMPEG_PATH.to_string(),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            job_timeout_sec: DEFAULT_JOB_TIMEOUT_SEC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub media_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub temp_dir: PathBuf,
    pub max_upload_size: u64,
    pub requester_header: String,

    // Feature configs (with defaults)
    pub media: MediaSettings,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub images_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub image_url_prefix: String,
    pub audio_url_prefix: String,
    pub placeholder_cover_url: String,
    pub public_host: String,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ffmpeg_path: PathBuf,
    pub max_concurrent_jobs: usize,
    pub job_timeout: Duration,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("media_path must be specified via --media-path or in config file")
            })?;

        if !media_path.exists() {
            bail!("Media directory does not exist: {:?}", media_path);
        }
        if !media_path.is_dir() {
            bail!("media_path is not a directory: {:?}", media_path);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ (both {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let temp_dir = file
            .temp_dir
            .map(PathBuf::from)
            .or_else(|| cli.temp_dir.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("mixtape-server"));

        let max_upload_size = file.max_upload_size.unwrap_or(cli.max_upload_size);
        if max_upload_size == 0 {
            bail!("max_upload_size must be greater than zero");
        }

        let requester_header = file
            .requester_header
            .unwrap_or_else(|| cli.requester_header.clone())
            .to_lowercase();
        if HeaderName::from_bytes(requester_header.as_bytes()).is_err() {
            bail!("Invalid requester_header: {:?}", requester_header);
        }

        // Media settings - merge file config with defaults
        let media_file = file.media.unwrap_or_default();
        let media = MediaSettings {
            images_dir: media_path.join(media_file.images_dir.as_deref().unwrap_or(DEFAULT_IMAGES_DIR)),
            audio_dir: media_path.join(media_file.audio_dir.as_deref().unwrap_or(DEFAULT_AUDIO_DIR)),
            image_url_prefix: media_file
                .image_url_prefix
                .unwrap_or_else(|| DEFAULT_IMAGE_URL_PREFIX.to_string()),
            audio_url_prefix: media_file
                .audio_url_prefix
                .unwrap_or_else(|| DEFAULT_AUDIO_URL_PREFIX.to_string()),
            placeholder_cover_url: media_file
                .placeholder_cover_url
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_COVER_URL.to_string()),
            public_host: media_file
                .public_host
                .unwrap_or_else(|| cli.public_host.clone()),
        };
        let layout = media.layout();
        for (name, prefix) in [
            ("image_url_prefix", layout.image_url_prefix()),
            ("audio_url_prefix", layout.audio_url_prefix()),
        ] {
            if prefix.is_empty() {
                bail!("{} cannot be empty", name);
            }
            if prefix == "/v1" || prefix.starts_with("/v1/") {
                bail!("{} {:?} overlaps the API routes", name, prefix);
            }
        }
        if layout.image_url_prefix() == layout.audio_url_prefix() {
            bail!(
                "image_url_prefix and audio_url_prefix must differ (both {:?})",
                layout.image_url_prefix()
            );
        }
        if media.public_host.trim().is_empty() {
            bail!("public_host cannot be empty");
        }

        let engine_file = file.engine.unwrap_or_default();
        let engine = EngineSettings {
            ffmpeg_path: PathBuf::from(
                engine_file
                    .ffmpeg_path
                    .unwrap_or_else(|| cli.ffmpeg_path.clone()),
            ),
            max_concurrent_jobs: engine_file
                .max_concurrent_jobs
                .unwrap_or(cli.max_concurrent_jobs),
            job_timeout: Duration::from_secs(
                engine_file.job_timeout_sec.unwrap_or(cli.job_timeout_sec),
            ),
        };
        if engine.max_concurrent_jobs == 0 {
            bail!("max_concurrent_jobs must be at least 1");
        }
        if engine.job_timeout.is_zero() {
            bail!("job_timeout_sec must be greater than zero");
        }

        Ok(Self {
            media_path,
            port,
            metrics_port,
            logging_level,
            temp_dir,
            max_upload_size,
            requester_header,
            media,
            engine,
        })
    }
}

impl MediaSettings {
    pub fn layout(&self) -> MediaLayout {
        MediaLayout::new(
            &self.images_dir,
            &self.audio_dir,
            &self.image_url_prefix,
            &self.audio_url_prefix,
        )
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli_with_media(dir: &TempDir) -> CliConfig {
        CliConfig {
            media_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(matches!(
            parse_logging_level("body"),
            Some(RequestsLoggingLevel::Body)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let media = TempDir::new().unwrap();
        let cli = CliConfig {
            media_path: Some(media.path().to_path_buf()),
            port: 3005,
            metrics_port: 9095,
            logging_level: RequestsLoggingLevel::Headers,
            temp_dir: Some(PathBuf::from("/scratch")),
            max_upload_size: 1024,
            requester_header: "X-Remote-User".to_string(),
            public_host: "music.example.org".to_string(),
            ffmpeg_path: "/opt/ffmpeg".to_string(),
            max_concurrent_jobs: 8,
            job_timeout_sec: 30,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.media_path, media.path());
        assert_eq!(config.port, 3005);
        assert_eq!(config.metrics_port, 9095);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.temp_dir, PathBuf::from("/scratch"));
        assert_eq!(config.max_upload_size, 1024);
        assert_eq!(config.requester_header, "x-remote-user");
        assert_eq!(config.media.public_host, "music.example.org");
        assert_eq!(config.engine.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.engine.max_concurrent_jobs, 8);
        assert_eq!(config.engine.job_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_defaults() {
        let media = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_media(&media), None).unwrap();

        assert_eq!(config.media.images_dir, media.path().join("images"));
        assert_eq!(config.media.audio_dir, media.path().join("mp3"));
        assert_eq!(config.media.image_url_prefix, "/images");
        assert_eq!(config.media.audio_url_prefix, "/mp3");
        assert_eq!(
            config.media.placeholder_cover_url,
            "http://localhost:3000/assets/img/covers/cover.svg"
        );
        assert_eq!(config.requester_header, "x-user-name");
        assert_eq!(config.engine.max_concurrent_jobs, 2);
        assert_eq!(config.engine.job_timeout, Duration::from_secs(300));
        assert_eq!(config.temp_dir, std::env::temp_dir().join("mixtape-server"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let media = TempDir::new().unwrap();
        let cli = CliConfig {
            media_path: Some(PathBuf::from("/should/be/overridden")),
            port: 3001,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            ..Default::default()
        };

        let file_config = FileConfig {
            media_path: Some(media.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            media: Some(MediaConfig {
                images_dir: Some("covers".to_string()),
                audio_url_prefix: Some("/audio/".to_string()),
                ..Default::default()
            }),
            engine: Some(EngineConfig {
                max_concurrent_jobs: Some(6),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.media_path, media.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.media.images_dir, media.path().join("covers"));
        assert_eq!(config.media.layout().audio_url_prefix(), "/audio");
        assert_eq!(config.engine.max_concurrent_jobs, 6);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.engine.job_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_resolve_missing_media_path_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("media_path must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_media_path_error() {
        let cli = CliConfig {
            media_path: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_media_path_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            media_path: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_rejects_bad_engine_settings() {
        let media = TempDir::new().unwrap();

        let cli = CliConfig {
            max_concurrent_jobs: 0,
            ..cli_with_media(&media)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());

        let cli = CliConfig {
            job_timeout_sec: 0,
            ..cli_with_media(&media)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_resolve_rejects_bad_media_settings() {
        let media = TempDir::new().unwrap();

        let same_prefixes = FileConfig {
            media: Some(MediaConfig {
                image_url_prefix: Some("/static".to_string()),
                audio_url_prefix: Some("static/".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_media(&media), Some(same_prefixes)).is_err());

        let api_prefix = FileConfig {
            media: Some(MediaConfig {
                audio_url_prefix: Some("/v1/tracks".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_media(&media), Some(api_prefix)).is_err());

        let cli = CliConfig {
            requester_header: "not a header".to_string(),
            ..cli_with_media(&media)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_resolve_same_ports_error() {
        let media = TempDir::new().unwrap();
        let cli = CliConfig {
            port: 3001,
            metrics_port: 3001,
            ..cli_with_media(&media)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }
}
