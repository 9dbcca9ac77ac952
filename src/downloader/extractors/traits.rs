// InfoExtractor trait and common types

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{StreamDescriptor, VideoInfo};

/// Extraction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorMode {
    /// Python module yt_dlp (better for YouTube, avoids bot detection)
    Python,
    /// CLI binary yt-dlp (faster, no Python dependency)
    Cli,
    /// Auto-select: Python → CLI fallback
    #[default]
    Auto,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ExtractorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "cli" => Ok(Self::Cli),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown extractor mode '{}'", other)),
        }
    }
}

/// Configuration for info extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Extraction mode (Python, CLI, or Auto)
    pub mode: ExtractorMode,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    /// YouTube player client (android, web, tv)
    pub player_client: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            mode: ExtractorMode::Auto,
            proxy: None,
            cookies_path: None,
            timeout_seconds: 30,
            player_client: None,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_mode(mut self, mode: ExtractorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_player_client(mut self, client: Option<String>) -> Self {
        self.player_client = client;
        self
    }

    /// Bound for the whole extractor process, a few socket timeouts long.
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds.max(1)) * 4)
    }

    /// yt-dlp flags shared by every extractor flavour, URL last.
    pub fn ytdlp_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.timeout_seconds.to_string(),
        ];

        if let Some(client) = &self.player_client {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }

        if let Some(path) = &self.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }
}

/// Trait for info extractors
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Check if this extractor is available
    fn is_available(&self) -> bool;

    /// Resolve a URL to title and streams
    async fn extract(&self, url: &str, config: &ExtractorConfig)
        -> Result<VideoInfo, DownloadError>;
}

/// Parse `--dump-json` output into [`VideoInfo`].
///
/// Formats without a numeric itag or a direct URL (storyboards, HLS
/// manifests) are skipped.
pub fn parse_video_info(stdout: &[u8]) -> Result<VideoInfo, DownloadError> {
    let json_str = String::from_utf8_lossy(stdout);
    let json: serde_json::Value = serde_json::from_str(json_str.trim())
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

    let formats_array = json["formats"]
        .as_array()
        .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

    let streams = formats_array.iter().filter_map(parse_stream).collect();

    Ok(VideoInfo {
        id: json["id"].as_str().unwrap_or("unknown").to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
        duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
        streams,
    })
}

fn parse_stream(f: &serde_json::Value) -> Option<StreamDescriptor> {
    let format_id = f["format_id"].as_str()?;
    let itag: u32 = match format_id.parse() {
        Ok(itag) => itag,
        Err(_) => {
            tracing::trace!(format_id, "skipping format without numeric itag");
            return None;
        }
    };
    let url = f["url"].as_str().filter(|u| u.starts_with("http"))?;

    let vcodec = f["vcodec"].as_str().map(|s| s.to_string());
    let acodec = f["acodec"].as_str().map(|s| s.to_string());
    let has_video = vcodec.as_deref().map_or(false, |v| v != "none");
    let has_audio = acodec.as_deref().map_or(false, |a| a != "none");

    let http_headers: HashMap<String, String> = f["http_headers"]
        .as_object()
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some(StreamDescriptor {
        itag,
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        url: url.to_string(),
        http_headers,
        width: f["width"].as_u64().map(|w| w as u32),
        height: f["height"].as_u64().map(|h| h as u32),
        fps: f["fps"].as_f64().map(|fps| fps as f32),
        abr: f["abr"].as_f64().map(|a| a as f32),
        filesize: f["filesize"].as_u64(),
        filesize_approx: f["filesize_approx"].as_u64(),
        vcodec,
        acodec,
        has_video,
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "abc123",
        "title": "Test Video",
        "uploader": "Someone",
        "duration": 212.4,
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "url": "https://i.ytimg.com/sb/x", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "url": "https://rr1.example/a", "vcodec": "none",
             "acodec": "mp4a.40.2", "abr": 129.5, "filesize": 3400000,
             "http_headers": {"User-Agent": "UA", "Accept": "*/*"}},
            {"format_id": "137", "ext": "mp4", "url": "https://rr1.example/v", "vcodec": "avc1.640028",
             "acodec": "none", "width": 1920, "height": 1080, "fps": 30, "filesize_approx": 90000000},
            {"format_id": "18", "ext": "mp4", "url": "https://rr1.example/p", "vcodec": "avc1.42001E",
             "acodec": "mp4a.40.2", "width": 640, "height": 360, "fps": 25},
            {"format_id": "96", "ext": "mp4", "protocol": "m3u8_native", "vcodec": "avc1", "acodec": "mp4a"}
        ]
    }"#;

    #[test]
    fn test_parse_video_info() {
        let info = parse_video_info(SAMPLE.as_bytes()).unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.title, "Test Video");
        assert_eq!(info.duration_seconds, 212);
        assert_eq!(
            info.streams.iter().map(|s| s.itag).collect::<Vec<_>>(),
            vec![140, 137, 18]
        );

        let audio = info.stream(140).unwrap();
        assert!(audio.is_audio_only());
        assert_eq!(audio.http_headers.get("User-Agent").map(String::as_str), Some("UA"));

        let video = info.stream(137).unwrap();
        assert!(video.has_video && !video.has_audio);
        assert_eq!(video.effective_size(), Some(90_000_000));

        assert!(info.stream(18).unwrap().is_progressive());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_video_info(b"not json"),
            Err(DownloadError::ParseError(_))
        ));
        assert!(matches!(
            parse_video_info(br#"{"title": "x"}"#),
            Err(DownloadError::ParseError(_))
        ));
    }

    #[test]
    fn test_ytdlp_args() {
        let config = ExtractorConfig::default()
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
            .with_player_client(Some("web".to_string()))
            .with_timeout(15);
        let args = config.ytdlp_args("https://www.youtube.com/watch?v=abc");

        assert_eq!(args.first().map(String::as_str), Some("--dump-json"));
        assert_eq!(args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=abc"));
        assert!(args.windows(2).any(|w| w[0] == "--socket-timeout" && w[1] == "15"));
        assert!(args.windows(2).any(|w| w[0] == "--proxy" && w[1] == "socks5://127.0.0.1:1080"));
        assert!(args.contains(&"youtube:player_client=web".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("CLI".parse::<ExtractorMode>(), Ok(ExtractorMode::Cli));
        assert!("ruby".parse::<ExtractorMode>().is_err());
    }
}
