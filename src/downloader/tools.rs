use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::utils::{find_binary, run_output_with_timeout};

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "yt-dlp")]
    YtDlp,
    #[serde(rename = "ffmpeg")]
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Reports which external tools the server can run
#[derive(Debug, Clone)]
pub struct ToolManager {
    ytdlp: PathBuf,
    ffmpeg: PathBuf,
}

impl ToolManager {
    pub fn new(ytdlp: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp: ytdlp.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let configured = match tool_type {
            ToolType::YtDlp => &self.ytdlp,
            ToolType::Ffmpeg => &self.ffmpeg,
        };

        let path = Self::locate(configured);
        let version = match &path {
            Some(path) => Self::get_version(path, tool_type).await,
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: version.is_some(),
            version,
            path: path.map(|p| p.display().to_string()),
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }

    /// Explicit paths are taken as-is, bare names are searched for
    fn locate(configured: &Path) -> Option<PathBuf> {
        if configured.components().count() > 1 {
            return configured.exists().then(|| configured.to_path_buf());
        }
        find_binary(&configured.to_string_lossy())
    }

    async fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
        match run_output_with_timeout(path, &[tool_type.version_arg()], VERSION_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                parse_version(&String::from_utf8_lossy(&output.stdout), tool_type)
            }
            Ok(output) => {
                tracing::warn!(tool = tool_type.as_str(), status = %output.status, "version check failed");
                None
            }
            Err(e) => {
                tracing::warn!(tool = tool_type.as_str(), "version check failed: {}", e);
                None
            }
        }
    }
}

/// yt-dlp prints the bare version; ffmpeg prints "ffmpeg version X ..." first
fn parse_version(stdout: &str, tool_type: ToolType) -> Option<String> {
    let first_line = stdout.lines().next()?.trim();
    let version = match tool_type {
        ToolType::YtDlp => first_line,
        ToolType::Ffmpeg => first_line
            .strip_prefix("ffmpeg version ")
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or(first_line),
    };
    (!version.is_empty()).then(|| version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("2024.12.13\n", ToolType::YtDlp).as_deref(),
            Some("2024.12.13")
        );
        assert_eq!(
            parse_version(
                "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023\nbuilt with gcc",
                ToolType::Ffmpeg
            )
            .as_deref(),
            Some("6.1.1-3ubuntu5")
        );
        assert_eq!(parse_version("", ToolType::Ffmpeg), None);
    }

    #[tokio::test]
    async fn test_missing_tools_are_unavailable() {
        let manager = ToolManager::new("/nonexistent/yt-dlp", "/nonexistent/ffmpeg");
        let tools = manager.get_all_tools().await;

        assert_eq!(tools.len(), 2);
        assert!(tools.iter().all(|t| !t.is_available && t.path.is_none()));
        assert_eq!(tools[1].tool_type, ToolType::Ffmpeg);
    }

    #[test]
    fn test_tool_type_json() {
        assert_eq!(serde_json::to_value(ToolType::YtDlp).unwrap(), "yt-dlp");
    }
}
