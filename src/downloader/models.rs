// Common data models for the download pipeline

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of media a client asks for (`type` form field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(format!("Unknown media type: {}", other)),
        }
    }
}

/// One encoding/container variant of a video as reported by the extractor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Platform format identifier (e.g. 137, 140)
    pub itag: u32,
    /// Container extension (mp4, webm, m4a)
    pub ext: String,
    /// Direct media URL
    pub url: String,
    /// Headers the platform expects when fetching `url`
    pub http_headers: HashMap<String, String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamDescriptor {
    /// Video if the stream carries a picture, audio otherwise
    pub fn kind(&self) -> MediaKind {
        if self.has_video {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    /// Both tracks in one container, can be served as-is
    pub fn is_progressive(&self) -> bool {
        self.has_audio && self.has_video
    }

    /// Resolution label such as "1080p"
    pub fn resolution(&self) -> Option<String> {
        self.height.filter(|h| *h > 0).map(|h| format!("{}p", h))
    }

    /// Exact file size, or the approximate one when exact is unknown
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    /// MIME type of the raw container
    pub fn mime_type(&self) -> &'static str {
        match (self.ext.as_str(), self.has_video) {
            ("webm", true) => "video/webm",
            ("webm", false) => "audio/webm",
            ("m4a", _) | ("mp4", false) => "audio/mp4",
            ("3gp", _) => "video/3gpp",
            _ => "video/mp4",
        }
    }
}

/// Video metadata resolved from a URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub streams: Vec<StreamDescriptor>,
}

impl VideoInfo {
    pub fn stream(&self, itag: u32) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.itag == itag)
    }
}

/// Frame rate column: a number, or "N/A" for audio and unknown rates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FpsField {
    Rate(u32),
    NotAvailable(&'static str),
}

impl FpsField {
    pub fn from_rate(fps: Option<f32>) -> Self {
        match fps {
            Some(rate) if rate > 0.0 => Self::Rate(rate.round() as u32),
            _ => Self::NotAvailable("N/A"),
        }
    }
}

/// One row of the format listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEntry {
    pub itag: u32,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub resolution: String,
    pub fps: FpsField,
    pub size: String,
}

/// Body of a successful `/get_formats` response
#[derive(Debug, Clone, Serialize)]
pub struct FormatsResponse {
    pub title: String,
    pub formats: Vec<FormatEntry>,
}
