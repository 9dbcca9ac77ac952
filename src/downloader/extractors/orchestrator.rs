// InfoExtractor Orchestrator - automatic mode selection and fallback
//
// Strategy:
// 1. For YouTube: Python mode preferred (better anti-bot bypass)
// 2. For other sites: CLI mode preferred (faster)
// 3. Fallback to the other mode on failure, except when rate limited

use std::path::PathBuf;

use async_trait::async_trait;

use super::cli::CliInfoExtractor;
use super::diagnostics::diagnose_error;
use super::python::PythonInfoExtractor;
use super::traits::{ExtractorConfig, ExtractorMode, InfoExtractor};
use crate::downloader::errors::DownloadError;
use crate::downloader::models::VideoInfo;

/// Orchestrator that manages Python and CLI extractors
pub struct InfoExtractorOrchestrator {
    python: Box<dyn InfoExtractor>,
    cli: Box<dyn InfoExtractor>,
}

impl InfoExtractorOrchestrator {
    pub fn new(python: Box<dyn InfoExtractor>, cli: Box<dyn InfoExtractor>) -> Self {
        Self { python, cli }
    }

    /// Orchestrator over the real `python3 -m yt_dlp` and `yt-dlp` commands
    pub fn from_commands(python_cmd: impl Into<PathBuf>, ytdlp_path: impl Into<PathBuf>) -> Self {
        Self::new(
            Box::new(PythonInfoExtractor::new(python_cmd)),
            Box::new(CliInfoExtractor::new(ytdlp_path)),
        )
    }

    /// Order in which modes are tried for a URL
    pub fn plan(url: &str, mode: ExtractorMode) -> Vec<ExtractorMode> {
        match mode {
            ExtractorMode::Python => vec![ExtractorMode::Python],
            ExtractorMode::Cli => vec![ExtractorMode::Cli],
            ExtractorMode::Auto if is_youtube(url) => {
                vec![ExtractorMode::Python, ExtractorMode::Cli]
            }
            ExtractorMode::Auto => vec![ExtractorMode::Cli, ExtractorMode::Python],
        }
    }

    /// Run both availability checks so later `is_available` calls hit the
    /// cache. The checks spawn processes and block; call off the runtime.
    pub fn warm_up(&self) -> Vec<(&'static str, bool)> {
        [self.python.as_ref(), self.cli.as_ref()]
            .into_iter()
            .map(|extractor| (extractor.name(), extractor.is_available()))
            .collect()
    }

    fn extractor(&self, mode: ExtractorMode) -> &dyn InfoExtractor {
        match mode {
            ExtractorMode::Python => self.python.as_ref(),
            _ => self.cli.as_ref(),
        }
    }
}

#[async_trait]
impl InfoExtractor for InfoExtractorOrchestrator {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    fn is_available(&self) -> bool {
        self.python.is_available() || self.cli.is_available()
    }

    async fn extract(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<VideoInfo, DownloadError> {
        let plan = Self::plan(url, config.mode);
        let mut last_error = None;

        for (i, mode) in plan.iter().enumerate() {
            let extractor = self.extractor(*mode);
            if config.mode == ExtractorMode::Auto && !extractor.is_available() {
                tracing::debug!(extractor = extractor.name(), "extractor not available, skipping");
                continue;
            }

            tracing::debug!(extractor = extractor.name(), %url, "extracting");
            match extractor.extract(url, config).await {
                Ok(info) => return Ok(info),
                // Retrying with the other flavour would only add load
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    if i + 1 < plan.len() {
                        tracing::warn!(
                            extractor = extractor.name(),
                            reason = ?diagnose_error(&e.to_string()),
                            "extraction failed, falling back: {}",
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DownloadError::ToolNotFound(
                "Neither Python yt_dlp nor yt-dlp binary available".to_string(),
            )
        }))
    }
}

fn is_youtube(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("youtube.com") || lower.contains("youtu.be")
}
