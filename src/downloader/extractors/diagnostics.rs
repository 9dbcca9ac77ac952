// Blocking diagnostics - identifies why YouTube refused a request
//
// Analyzes extractor stderr to determine:
// - The HTTP status YouTube answered with, if any
// - The type of blocking (unavailable, private, geo, bot checks, ...)

use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref HTTP_ERROR_RE: Regex =
        Regex::new(r"HTTP Error (\d{3})").expect("valid HTTP error pattern");
}

/// Reasons why YouTube might block a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// PO Token (Proof of Origin) required
    PoTokenRequired,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// Network timeout (soft IP block)
    NetworkTimeout,

    /// Rate limiting (too many requests)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// DRM-protected content (YouTube Premium, Music, Movies)
    DrmProtected,

    /// Member-only content (requires channel membership)
    MembersOnly,

    /// Generic/unknown blocking
    Unknown,
}

impl BlockingReason {
    /// The video itself cannot be served to us, whatever we retry.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::VideoUnavailable
                | Self::PrivateVideo
                | Self::DrmProtected
                | Self::MembersOnly
                | Self::AgeRestricted
                | Self::GeoBlocked
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::PoTokenRequired => "Proof of Origin token required",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::NetworkTimeout => "Network timeout (possible IP throttling)",
            Self::RateLimited => "Rate limited by YouTube",
            Self::BotDetection => "Bot detection triggered",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "Members-only content",
            Self::Unknown => "Unknown blocking reason",
        }
    }
}

/// Extract the numeric status from an `HTTP Error NNN` line.
pub fn http_status(error: &str) -> Option<u16> {
    HTTP_ERROR_RE
        .captures(error)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Analyze error message and return blocking reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    // Check patterns in order of specificity

    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("youtube premium")
        || lower.contains("requires purchase")
        || lower.contains("rental")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("join this channel")
        || lower.contains("available to members")
    {
        return Some(BlockingReason::MembersOnly);
    }

    if lower.contains("po token") || lower.contains("proof of origin") {
        return Some(BlockingReason::PoTokenRequired);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("this video is no longer available")
        || lower.contains("video is unavailable")
    {
        return Some(BlockingReason::VideoUnavailable);
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restricted")
    {
        return Some(BlockingReason::GeoBlocked);
    }

    // A bare "429" may be part of a video id; only the status or the
    // reason phrase counts.
    if http_status(error) == Some(429)
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("confirm you're not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
    {
        return Some(BlockingReason::BotDetection);
    }

    if http_status(error) == Some(403) || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
    {
        return Some(BlockingReason::NetworkTimeout);
    }

    if !error.trim().is_empty() {
        return Some(BlockingReason::Unknown);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_extraction() {
        assert_eq!(http_status("ERROR: HTTP Error 429: Too Many Requests"), Some(429));
        assert_eq!(http_status("ERROR: HTTP Error 403: Forbidden"), Some(403));
        assert_eq!(http_status("ERROR: [youtube] a429b: Video unavailable"), None);
    }

    #[test]
    fn test_403_detection() {
        let error = "ERROR: HTTP Error 403: Forbidden";
        assert_eq!(diagnose_error(error), Some(BlockingReason::Http403Forbidden));
    }

    #[test]
    fn test_rate_limit_detection() {
        assert_eq!(
            diagnose_error("HTTP Error 429: Too Many Requests"),
            Some(BlockingReason::RateLimited)
        );
        assert_eq!(
            diagnose_error("ERROR: [youtube] x429x: something odd"),
            Some(BlockingReason::Unknown)
        );
    }

    #[test]
    fn test_po_token_detection() {
        let error = "mweb client https formats require a GVS PO Token";
        assert_eq!(diagnose_error(error), Some(BlockingReason::PoTokenRequired));
    }

    #[test]
    fn test_age_restricted_detection() {
        let error = "Sign in to confirm your age";
        assert_eq!(diagnose_error(error), Some(BlockingReason::AgeRestricted));
        assert!(BlockingReason::AgeRestricted.is_unavailable());
    }

    #[test]
    fn test_timeout_detection() {
        let error = "Timed out after 30s";
        assert_eq!(diagnose_error(error), Some(BlockingReason::NetworkTimeout));
        assert!(!BlockingReason::NetworkTimeout.is_unavailable());
    }

    #[test]
    fn test_geo_detection() {
        let error = "Video not available in your country";
        assert_eq!(diagnose_error(error), Some(BlockingReason::GeoBlocked));
    }

    #[test]
    fn test_drm_detection() {
        assert_eq!(
            diagnose_error("This video is DRM protected"),
            Some(BlockingReason::DrmProtected)
        );
        assert_eq!(
            diagnose_error("This video requires YouTube Premium"),
            Some(BlockingReason::DrmProtected)
        );
    }

    #[test]
    fn test_members_only_detection() {
        let error = "This video is available to members only";
        assert_eq!(diagnose_error(error), Some(BlockingReason::MembersOnly));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(diagnose_error("   "), None);
    }
}
