// CLI InfoExtractor - uses native `yt-dlp` binary
//
// Faster than Python mode and has no interpreter dependency, but more
// likely to trigger YouTube bot detection.

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::traits::{parse_video_info, ExtractorConfig, InfoExtractor};
use crate::downloader::errors::DownloadError;
use crate::downloader::models::VideoInfo;
use crate::downloader::utils::{run_output_with_timeout, tool_name};

/// CLI-based info extractor using yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: PathBuf,
    available: OnceLock<bool>,
}

impl CliInfoExtractor {
    pub fn new(ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            available: OnceLock::new(),
        }
    }
}

#[async_trait]
impl InfoExtractor for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            StdCommand::new(&self.ytdlp_path)
                .arg("--version")
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false)
        })
    }

    async fn extract(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<VideoInfo, DownloadError> {
        if !self.is_available() {
            return Err(DownloadError::ToolNotFound(
                "yt-dlp binary not found".to_string(),
            ));
        }

        let args = config.ytdlp_args(url);
        run_dump_json(&self.ytdlp_path, &args, config.process_timeout()).await
    }
}

/// Run an extractor command and turn its output into [`VideoInfo`].
///
/// A non-zero exit is classified from stderr.
pub(super) async fn run_dump_json<S: AsRef<std::ffi::OsStr>>(
    program: &Path,
    args: &[S],
    limit: Duration,
) -> Result<VideoInfo, DownloadError> {
    let tool = tool_name(program);
    tracing::debug!(
        tool = %tool,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        "running extractor"
    );

    let started = Instant::now();
    let output = run_output_with_timeout(program, args, limit).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(tool = %tool, status = %output.status, stderr = %stderr.trim(), "extractor failed");
        return Err(DownloadError::from_extractor_stderr(&stderr));
    }

    let info = parse_video_info(&output.stdout)?;
    tracing::info!(
        tool = %tool,
        title = %info.title,
        streams = info.streams.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "extraction complete"
    );
    Ok(info)
}
