// Error types for the download pipeline

use std::time::Duration;

use thiserror::Error;

use super::extractors::{diagnose_error, http_status, BlockingReason};

#[derive(Debug, Error)]
pub enum DownloadError {
    /// URL rejected by the extractor (unsupported or malformed)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Video removed, private, geo-blocked or otherwise not downloadable
    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    /// Extractor ran but could not produce metadata
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The platform answered with a non-success HTTP status
    #[error("HTTP Error {status}: {message}")]
    UpstreamHttp { status: u16, message: String },

    /// Rate limiting persisted through every attempt
    #[error("Max retries reached after {attempts} attempts, please try again later")]
    RetriesExhausted { attempts: u32 },

    /// Requested itag is not among the resolved streams
    #[error("No stream with itag {0}")]
    StreamNotFound(u32),

    /// Merge requested but the video has no audio-only stream
    #[error("No audio stream available")]
    NoAudioStream,

    /// yt-dlp, python or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Subprocess exited with a non-zero status
    #[error("{tool} error ({status}): {stderr}")]
    ProcessFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Subprocess exceeded its time budget and was killed
    #[error("{tool} timed out after {timeout:?}")]
    ProcessTimeout { tool: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl DownloadError {
    /// True when the platform throttled us and the request may be retried.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::UpstreamHttp { status: 429, .. })
    }

    /// True for failures caused by the request itself or the upstream
    /// resource rather than by this server.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidUrl(_)
            | Self::VideoUnavailable(_)
            | Self::ExtractionFailed(_)
            | Self::StreamNotFound(_)
            | Self::NoAudioStream => true,
            Self::UpstreamHttp { status, .. } => *status != 429,
            _ => false,
        }
    }

    /// Classify extractor stderr into a typed error.
    ///
    /// The HTTP status is read out of `HTTP Error NNN` lines so callers can
    /// match on it instead of searching the message text.
    pub fn from_extractor_stderr(stderr: &str) -> Self {
        let message = summarize(stderr);

        if let Some(status) = http_status(stderr) {
            return Self::UpstreamHttp { status, message };
        }

        if stderr.contains("Unsupported URL") || stderr.contains("is not a valid URL") {
            return Self::InvalidUrl(message);
        }

        match diagnose_error(stderr) {
            Some(BlockingReason::RateLimited) => Self::UpstreamHttp {
                status: 429,
                message,
            },
            Some(reason) if reason.is_unavailable() => {
                Self::VideoUnavailable(format!("{}: {}", reason.description(), message))
            }
            Some(BlockingReason::NetworkTimeout) => Self::ExtractionFailed(format!(
                "{}: {}",
                BlockingReason::NetworkTimeout.description(),
                message
            )),
            _ => Self::ExtractionFailed(message),
        }
    }
}

/// First `ERROR:` line of a tool's stderr, or its last non-empty line.
fn summarize(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}
