pub mod config;
pub mod downloader;
pub mod web;

use std::sync::Arc;

use anyhow::Context;

use config::ServerConfig;
use downloader::extractors::InfoExtractorOrchestrator;
use downloader::fetch::HttpStreamFetcher;
use downloader::ffmpeg::Ffmpeg;
use downloader::temp::TempWorkspace;
use downloader::tools::ToolManager;
use downloader::Downloader;
use web::AppState;

/// Wire the downloader from `config` and serve HTTP until stopped.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let workspace = TempWorkspace::new(&config.temp_dir).with_context(|| {
        format!("failed to create temp dir {}", config.temp_dir.display())
    })?;
    let fetcher = HttpStreamFetcher::new(config.chunk_size, config.extractor.proxy.as_deref())
        .context("failed to build HTTP client")?;
    let extractor = Arc::new(InfoExtractorOrchestrator::from_commands(
        &config.python_cmd,
        &config.ytdlp_path,
    ));

    // Availability checks block on subprocesses; settle them before serving
    let probe = Arc::clone(&extractor);
    let checked = tokio::task::spawn_blocking(move || probe.warm_up())
        .await
        .context("extractor availability check failed")?;
    for (name, available) in checked {
        tracing::info!(extractor = name, available, "extractor checked");
    }

    let downloader = Downloader::new(
        extractor,
        Arc::new(fetcher),
        Ffmpeg::new(&config.ffmpeg_path, config.ffmpeg_timeout),
        workspace,
    )
    .with_retry(config.retry.clone())
    .with_extractor_config(config.extractor.clone());

    let tools = ToolManager::new(&config.ytdlp_path, &config.ffmpeg_path);
    for tool in tools.get_all_tools().await {
        match &tool.version {
            Some(version) => tracing::info!(tool = %tool.name, %version, "tool found"),
            None => tracing::warn!(tool = %tool.name, "tool not available"),
        }
    }

    tracing::info!(
        mode = %config.extractor.mode,
        temp_dir = %config.temp_dir.display(),
        max_attempts = config.retry.max_attempts,
        "starting server"
    );

    web::run_server(config.bind_addr, AppState::new(downloader, tools))
        .await
        .context("server error")
}
