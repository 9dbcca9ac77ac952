// Downloader module - resolution, format listing and delivery

pub mod errors;
pub mod extractors;
pub mod ffmpeg;
pub mod fetch;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod temp;
pub mod tools;
pub mod traits;
pub mod url;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::DownloadError;
pub use models::{FormatEntry, FormatsResponse, MediaKind, StreamDescriptor, VideoInfo};
pub use orchestrator::{DeliveryStrategy, Downloader, PreparedDownload};
pub use retry::RetryPolicy;
pub use traits::{ByteStream, StreamFetcher};
