// Downloader: resolve, list formats, and prepare download bodies

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::{StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;

use super::errors::DownloadError;
use super::extractors::{ExtractorConfig, InfoExtractor};
use super::ffmpeg::Ffmpeg;
use super::format_selector::FormatSelector;
use super::models::{FormatsResponse, MediaKind, StreamDescriptor, VideoInfo};
use super::retry::RetryPolicy;
use super::temp::{GuardedStream, TempWorkspace};
use super::traits::{ByteStream, StreamFetcher};
use super::url::normalize_url;
use super::utils::attachment_filename;

/// How a download reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    /// Raw audio transcoded to MP3 on the fly
    Transcode,
    /// Video-only stream muxed with the best audio stream
    Merge,
    /// Stream already carries both tracks, bytes are relayed as-is
    Proxy,
}

impl fmt::Display for DeliveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transcode => write!(f, "transcode"),
            Self::Merge => write!(f, "merge"),
            Self::Proxy => write!(f, "proxy"),
        }
    }
}

/// A download ready to be sent: headers known, body not yet consumed
pub struct PreparedDownload {
    pub filename: String,
    pub content_type: &'static str,
    pub strategy: DeliveryStrategy,
    pub body: ByteStream,
}

pub struct Downloader {
    extractor: Arc<dyn InfoExtractor>,
    fetcher: Arc<dyn StreamFetcher>,
    ffmpeg: Ffmpeg,
    workspace: TempWorkspace,
    retry: RetryPolicy,
    extractor_config: ExtractorConfig,
}

impl Downloader {
    pub fn new(
        extractor: Arc<dyn InfoExtractor>,
        fetcher: Arc<dyn StreamFetcher>,
        ffmpeg: Ffmpeg,
        workspace: TempWorkspace,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            ffmpeg,
            workspace,
            retry: RetryPolicy::default(),
            extractor_config: ExtractorConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_extractor_config(mut self, config: ExtractorConfig) -> Self {
        self.extractor_config = config;
        self
    }

    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Title and format rows for a URL, retried on rate limits.
    pub async fn list_formats(&self, raw_url: &str) -> Result<FormatsResponse, DownloadError> {
        let url = normalize_url(raw_url);
        tracing::info!(%url, "listing formats");

        let info = self
            .retry
            .run("get_formats", |attempt| self.resolve(&url, attempt))
            .await?;

        let formats = FormatSelector::list_formats(&info);
        tracing::info!(title = %info.title, formats = formats.len(), "formats listed");
        Ok(FormatsResponse {
            title: info.title,
            formats,
        })
    }

    /// Resolve metadata and prepare the body for `itag`.
    ///
    /// The whole preparation runs inside the retry policy, so a 429 from the
    /// CDN while fetching raw streams is retried as well.
    pub async fn prepare_download(
        &self,
        raw_url: &str,
        itag: u32,
        kind: MediaKind,
    ) -> Result<PreparedDownload, DownloadError> {
        let url = normalize_url(raw_url);
        tracing::info!(%url, itag, %kind, "preparing download");

        let started = Instant::now();
        let prepared = self
            .retry
            .run("download", |attempt| self.prepare_once(&url, itag, kind, attempt))
            .await?;

        tracing::info!(
            itag,
            strategy = %prepared.strategy,
            filename = %prepared.filename,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "download ready"
        );
        Ok(prepared)
    }

    async fn resolve(&self, url: &str, attempt: u32) -> Result<VideoInfo, DownloadError> {
        tracing::info!(attempt, extractor = self.extractor.name(), "fetching video info");
        self.extractor.extract(url, &self.extractor_config).await
    }

    async fn prepare_once(
        &self,
        url: &str,
        itag: u32,
        kind: MediaKind,
        attempt: u32,
    ) -> Result<PreparedDownload, DownloadError> {
        let info = self.resolve(url, attempt).await?;
        let stream = info.stream(itag).ok_or(DownloadError::StreamNotFound(itag))?;

        match kind {
            MediaKind::Audio => self.transcode(&info, stream).await,
            MediaKind::Video if stream.has_video && !stream.has_audio => {
                self.merge(&info, stream).await
            }
            MediaKind::Video => self.proxy(&info, stream).await,
        }
    }

    async fn transcode(
        &self,
        info: &VideoInfo,
        stream: &StreamDescriptor,
    ) -> Result<PreparedDownload, DownloadError> {
        let input = self.workspace.allocate("audio", "m4a");
        let bytes = self.fetcher.download_to(stream, input.path()).await?;
        tracing::debug!(itag = stream.itag, bytes, "raw audio downloaded");

        let mp3 = self.ffmpeg.transcode_to_mp3(input.path()).await?;
        let body = prime(GuardedStream::new(mp3, vec![input]).boxed()).await?;

        Ok(PreparedDownload {
            filename: attachment_filename(&info.title, "mp3"),
            content_type: "audio/mpeg",
            strategy: DeliveryStrategy::Transcode,
            body,
        })
    }

    async fn merge(
        &self,
        info: &VideoInfo,
        stream: &StreamDescriptor,
    ) -> Result<PreparedDownload, DownloadError> {
        let audio_stream =
            FormatSelector::best_audio(&info.streams).ok_or(DownloadError::NoAudioStream)?;

        let video = self.workspace.allocate("video", "mp4");
        let audio = self.workspace.allocate("audio", "m4a");
        let output = self.workspace.allocate("merged", "mp4");

        tokio::try_join!(
            self.fetcher.download_to(stream, video.path()),
            self.fetcher.download_to(audio_stream, audio.path()),
        )?;
        tracing::debug!(
            video_itag = stream.itag,
            audio_itag = audio_stream.itag,
            "raw streams downloaded"
        );

        self.ffmpeg
            .mux(video.path(), audio.path(), output.path())
            .await?;

        let file = tokio::fs::File::open(output.path()).await?;
        let body = ReaderStream::new(file).map_err(DownloadError::from).boxed();

        Ok(PreparedDownload {
            filename: attachment_filename(&info.title, "mp4"),
            content_type: "video/mp4",
            strategy: DeliveryStrategy::Merge,
            body: GuardedStream::new(body, vec![video, audio, output]).boxed(),
        })
    }

    async fn proxy(
        &self,
        info: &VideoInfo,
        stream: &StreamDescriptor,
    ) -> Result<PreparedDownload, DownloadError> {
        let body = self.fetcher.open(stream).await?;
        let ext = if stream.ext.is_empty() { "mp4" } else { stream.ext.as_str() };

        Ok(PreparedDownload {
            filename: attachment_filename(&info.title, ext),
            content_type: stream.mime_type(),
            strategy: DeliveryStrategy::Proxy,
            body,
        })
    }
}

/// Wait for the first chunk so a body that fails immediately surfaces as
/// an error before any response headers go out.
async fn prime(mut body: ByteStream) -> Result<ByteStream, DownloadError> {
    match body.next().await {
        Some(Ok(first)) => Ok(futures::stream::once(async move { Ok(first) })
            .chain(body)
            .boxed()),
        Some(Err(e)) => Err(e),
        None => Ok(futures::stream::empty().boxed()),
    }
}
