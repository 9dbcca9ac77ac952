// In-memory extractor and fetcher used by unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use super::errors::DownloadError;
use super::extractors::{ExtractorConfig, InfoExtractor};
use super::models::{StreamDescriptor, VideoInfo};
use super::traits::{ByteStream, StreamFetcher};

#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Extractor that replays scripted results, one per call
pub struct FakeExtractor {
    name: &'static str,
    available: bool,
    results: Mutex<VecDeque<Result<VideoInfo, DownloadError>>>,
    calls: CallCounter,
}

impl FakeExtractor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            available: true,
            results: Mutex::new(VecDeque::new()),
            calls: CallCounter::default(),
        }
    }

    pub fn unavailable(name: &'static str) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    pub fn push_ok(self, info: VideoInfo) -> Self {
        self.results.lock().unwrap().push_back(Ok(info));
        self
    }

    pub fn push_err(self, err: DownloadError) -> Self {
        self.results.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl InfoExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn extract(&self, _url: &str, _config: &ExtractorConfig) -> Result<VideoInfo, DownloadError> {
        self.calls.bump();
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DownloadError::ExtractionFailed("no scripted result".to_string())))
    }
}

/// Fetcher serving fixed bodies keyed by stream URL, in small chunks
#[derive(Default)]
pub struct FakeFetcher {
    bodies: HashMap<String, Bytes>,
    opened: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_body(mut self, url: &str, body: &'static [u8]) -> Self {
        self.bodies.insert(url.to_string(), Bytes::from_static(body));
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamFetcher for FakeFetcher {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, stream: &StreamDescriptor) -> Result<ByteStream, DownloadError> {
        self.opened.lock().unwrap().push(stream.url.clone());
        let body = self.bodies.get(&stream.url).cloned().ok_or(DownloadError::UpstreamHttp {
            status: 404,
            message: "Not Found".to_string(),
        })?;

        let chunks: Vec<Result<Bytes, DownloadError>> = body
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Video with a progressive 360p stream, a video-only 1080p stream and an
/// m4a audio stream, all served from `https://cdn.test/<itag>`
pub fn sample_video() -> VideoInfo {
    let stream = |itag: u32, ext: &str, height: Option<u32>, video: bool, audio: bool| StreamDescriptor {
        itag,
        ext: ext.to_string(),
        url: format!("https://cdn.test/{}", itag),
        height,
        fps: height.map(|_| 30.0),
        abr: (audio && !video).then_some(128.0),
        has_video: video,
        has_audio: audio,
        ..Default::default()
    };

    VideoInfo {
        id: "abc123".to_string(),
        title: "Test Clip".to_string(),
        uploader: "Someone".to_string(),
        duration_seconds: 10,
        streams: vec![
            stream(18, "mp4", Some(360), true, true),
            stream(137, "mp4", Some(1080), true, false),
            stream(140, "m4a", None, false, true),
        ],
    }
}

pub fn sample_fetcher() -> FakeFetcher {
    FakeFetcher::default()
        .with_body("https://cdn.test/18", b"PROGRESSIVE-BYTES")
        .with_body("https://cdn.test/137", b"VIDEO-ONLY")
        .with_body("https://cdn.test/140", b"AUDIO-ONLY")
}

pub fn rate_limited() -> DownloadError {
    DownloadError::UpstreamHttp {
        status: 429,
        message: "Too Many Requests".to_string(),
    }
}
