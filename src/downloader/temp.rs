// Temp files for downloads that need ffmpeg, removed on drop

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use uuid::Uuid;

use super::errors::DownloadError;
use super::traits::ByteStream;

/// Directory that holds per-request temp files
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    root: PathBuf,
}

impl TempWorkspace {
    /// Use `root`, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a unique `<label>-<uuid>.<ext>` path. Nothing is created on
    /// disk; whatever ends up there is removed when the artifact drops.
    pub fn allocate(&self, label: &str, ext: &str) -> TempArtifact {
        let name = format!("{}-{}.{}", label, Uuid::new_v4(), ext);
        TempArtifact {
            path: self.root.join(name),
        }
    }
}

/// A temp file path owned by one request
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "temp file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "failed to remove temp file: {}",
                e
            ),
        }
    }
}

/// Response stream that keeps temp files alive until the body is done.
///
/// Guards are released at end of stream, on the first error, or when the
/// stream is dropped (client disconnect).
pub struct GuardedStream {
    inner: ByteStream,
    guards: Vec<TempArtifact>,
}

impl GuardedStream {
    pub fn new(inner: ByteStream, guards: Vec<TempArtifact>) -> Self {
        Self { inner, guards }
    }
}

impl Stream for GuardedStream {
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.as_mut().poll_next(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.guards.clear();
        }
        polled
    }
}
