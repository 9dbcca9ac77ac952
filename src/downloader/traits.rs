// Stream fetcher trait definition

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::errors::DownloadError;
use super::models::StreamDescriptor;

/// Response body chunks, owned and sendable across tasks
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// Trait for fetching the bytes behind a [`StreamDescriptor`]
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    /// Name of the fetcher (for logging)
    fn name(&self) -> &'static str;

    /// Start fetching; fails early on upstream errors such as 403 or 429.
    async fn open(&self, stream: &StreamDescriptor) -> Result<ByteStream, DownloadError>;

    /// Fetch the whole stream into `dest`, returning the bytes written.
    async fn download_to(
        &self,
        stream: &StreamDescriptor,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let mut body = self.open(stream).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(
            fetcher = self.name(),
            itag = stream.itag,
            bytes = written,
            dest = %dest.display(),
            "stream saved"
        );
        Ok(written)
    }
}
