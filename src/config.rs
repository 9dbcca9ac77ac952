// Server configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::downloader::extractors::{ExtractorConfig, ExtractorMode};
use crate::downloader::fetch::DEFAULT_CHUNK_SIZE;
use crate::downloader::ffmpeg::DEFAULT_TIMEOUT;
use crate::downloader::retry::RetryPolicy;
use crate::downloader::utils::find_binary;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the server needs at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub ffmpeg_path: PathBuf,
    pub ytdlp_path: PathBuf,
    pub python_cmd: PathBuf,
    pub extractor: ExtractorConfig,
    pub temp_dir: PathBuf,
    pub retry: RetryPolicy,
    pub ffmpeg_timeout: Duration,
    pub chunk_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ytdlp_path: PathBuf::from("yt-dlp"),
            python_cmd: PathBuf::from("python3"),
            extractor: ExtractorConfig::default(),
            temp_dir: std::env::temp_dir().join("youtube-downloader"),
            retry: RetryPolicy::default(),
            ffmpeg_timeout: DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ServerConfig {
    /// Read the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if std::env::var_os("YTDLP_PATH").is_none() {
            if let Some(found) = find_binary("yt-dlp") {
                config.ytdlp_path = found;
            }
        }
        Ok(config)
    }

    /// Build from an arbitrary key lookup. Unset or blank keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", addr)?;
        }
        if let Some(path) = get("FFMPEG_PATH") {
            config.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(path) = get("YTDLP_PATH") {
            config.ytdlp_path = PathBuf::from(path);
        }
        if let Some(cmd) = get("YTDLP_PYTHON") {
            config.python_cmd = PathBuf::from(cmd);
        }
        if let Some(mode) = get("EXTRACTOR_MODE") {
            let mode = ExtractorMode::from_str(&mode).map_err(|reason| ConfigError::Invalid {
                key: "EXTRACTOR_MODE",
                value: mode.clone(),
                reason,
            })?;
            config.extractor = config.extractor.with_mode(mode);
        }
        config.extractor = config
            .extractor
            .with_proxy(get("YTDLP_PROXY"))
            .with_cookies_path(get("YTDLP_COOKIES"))
            .with_player_client(get("YTDLP_PLAYER_CLIENT"));
        if let Some(secs) = get("EXTRACTOR_TIMEOUT_SECS") {
            config.extractor = config
                .extractor
                .with_timeout(parse("EXTRACTOR_TIMEOUT_SECS", secs)?);
        }
        if let Some(dir) = get("DOWNLOAD_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(n) = get("RATE_LIMIT_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse("RATE_LIMIT_MAX_ATTEMPTS", n)?;
        }
        if let Some(secs) = get("RATE_LIMIT_BACKOFF_SECS") {
            config.retry.backoff = Duration::from_secs(parse("RATE_LIMIT_BACKOFF_SECS", secs)?);
        }
        if let Some(secs) = get("SETTLE_DELAY_SECS") {
            config.retry.settle_delay = Duration::from_secs(parse("SETTLE_DELAY_SECS", secs)?);
        }
        if let Some(secs) = get("FFMPEG_TIMEOUT_SECS") {
            config.ffmpeg_timeout = Duration::from_secs(parse("FFMPEG_TIMEOUT_SECS", secs)?);
        }
        if let Some(bytes) = get("DOWNLOAD_CHUNK_BYTES") {
            config.chunk_size = parse("DOWNLOAD_CHUNK_BYTES", bytes)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
