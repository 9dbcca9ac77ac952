// InfoExtractor module - video info extraction
//
// Provides two modes:
// - Python mode: Uses `python3 -m yt_dlp` (better for YouTube, avoids bot detection)
// - CLI mode: Uses native `yt-dlp` binary (faster, no Python dependency)
//
// The Orchestrator switches between modes based on the service type,
// availability of each tool, and failure of the preferred one.

mod cli;
mod diagnostics;
mod orchestrator;
mod python;
mod traits;

pub use cli::CliInfoExtractor;
pub use diagnostics::{diagnose_error, http_status, BlockingReason};
pub use orchestrator::InfoExtractorOrchestrator;
pub use python::PythonInfoExtractor;
pub use traits::{parse_video_info, ExtractorConfig, ExtractorMode, InfoExtractor};
