// HTTP stream fetcher: extractor headers, identity encoding, Range chunks

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT_ENCODING, RANGE};
use reqwest::{Client, Response, StatusCode};

use super::errors::DownloadError;
use super::models::StreamDescriptor;
use super::traits::{ByteStream, StreamFetcher};

/// Default size of one `Range` request (10 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Fetches media from the platform CDN with reqwest
#[derive(Clone)]
pub struct HttpStreamFetcher {
    client: Client,
    chunk_size: u64,
}

impl HttpStreamFetcher {
    pub fn new(chunk_size: u64, proxy: Option<&str>) -> Result<Self, DownloadError> {
        let mut builder = Client::builder();
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            chunk_size: chunk_size.max(1),
        })
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open(&self, stream: &StreamDescriptor) -> Result<ByteStream, DownloadError> {
        // Only an exact size is safe to split; approximate sizes overshoot
        let total = match stream.filesize {
            Some(total) if total > self.chunk_size => total,
            _ => {
                let response = send(&self.client, stream, None).await?;
                return Ok(body_stream(response));
            }
        };

        let first_end = self.chunk_size.min(total) - 1;
        let first = send(&self.client, stream, Some((0, first_end))).await?;

        // Server ignored Range and sent everything
        let next_start = if first.status() == StatusCode::PARTIAL_CONTENT {
            first_end + 1
        } else {
            total
        };

        tracing::debug!(
            itag = stream.itag,
            total,
            chunk_size = self.chunk_size,
            ranged = next_start < total,
            "fetching stream"
        );

        let state = ChunkState {
            client: self.client.clone(),
            stream: stream.clone(),
            chunk_size: self.chunk_size,
            next_start,
            total,
            pending: Some(first),
        };

        Ok(futures::stream::try_unfold(state, next_chunk)
            .try_flatten()
            .boxed())
    }
}

struct ChunkState {
    client: Client,
    stream: StreamDescriptor,
    chunk_size: u64,
    next_start: u64,
    total: u64,
    pending: Option<Response>,
}

async fn next_chunk(
    mut state: ChunkState,
) -> Result<Option<(ByteStream, ChunkState)>, DownloadError> {
    let response = match state.pending.take() {
        Some(response) => response,
        None if state.next_start >= state.total => return Ok(None),
        None => {
            let start = state.next_start;
            let end = (start + state.chunk_size).min(state.total) - 1;
            let response = send(&state.client, &state.stream, Some((start, end))).await?;
            state.next_start = end + 1;
            response
        }
    };

    Ok(Some((body_stream(response), state)))
}

async fn send(
    client: &Client,
    stream: &StreamDescriptor,
    range: Option<(u64, u64)>,
) -> Result<Response, DownloadError> {
    let mut request = client.get(&stream.url);

    for (key, value) in &stream.http_headers {
        if !key.eq_ignore_ascii_case("accept-encoding") {
            request = request.header(key, value);
        }
    }
    request = request.header(ACCEPT_ENCODING, "identity");

    if let Some((start, end)) = range {
        request = request.header(RANGE, format!("bytes={}-{}", start, end));
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        tracing::warn!(itag = stream.itag, status = status.as_u16(), "upstream refused stream");
        return Err(DownloadError::UpstreamHttp {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    Ok(response)
}

fn body_stream(response: Response) -> ByteStream {
    response.bytes_stream().map_err(DownloadError::from).boxed()
}
