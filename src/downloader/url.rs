// URL normalization: canonical watch URLs without share tracking

use url::Url;

const CANONICAL_WATCH: &str = "https://www.youtube.com/watch";

/// Rewrite a YouTube link into its canonical long form and drop share
/// tracking parameters.
///
/// `youtu.be/<id>` and `/shorts/<id>` become `watch?v=<id>`; other query
/// parameters survive in their original order. Anything that does not
/// parse as a YouTube URL is returned unchanged (trimmed).
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(_) => return trimmed.to_string(),
    };
    let host = match parsed.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return trimmed.to_string(),
    };
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host)
        .to_string();

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, v)| !v.is_empty() && !is_tracking_param(k, v))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let short_id = match host.as_str() {
        "youtu.be" => segments.first().copied(),
        "youtube.com" if segments.first() == Some(&"shorts") => segments.get(1).copied(),
        "youtube.com" => None,
        _ => return trimmed.to_string(),
    };

    if let Some(id) = short_id {
        return watch_url(id, &kept).unwrap_or_else(|| trimmed.to_string());
    }

    if host == "youtu.be" {
        // Short link without an id
        return trimmed.to_string();
    }

    let had_tracking = parsed.query_pairs().any(|(k, v)| is_tracking_param(&k, &v));
    if !had_tracking {
        return trimmed.to_string();
    }

    let mut cleaned = parsed.clone();
    cleaned.set_query(None);
    if !kept.is_empty() {
        cleaned.query_pairs_mut().extend_pairs(kept.iter());
    }
    cleaned.to_string()
}

fn watch_url(id: &str, extra: &[(String, String)]) -> Option<String> {
    let mut url = Url::parse(CANONICAL_WATCH).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("v", id);
        pairs.extend_pairs(extra.iter().filter(|(k, _)| k != "v"));
    }
    Some(url.to_string())
}

fn is_tracking_param(key: &str, value: &str) -> bool {
    match key {
        "si" | "pp" => true,
        "feature" => value.starts_with("share"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_link_with_share_id() {
        assert_eq!(
            normalize_url("https://youtu.be/KR7KcaettM?si=Xy12_ab"),
            "https://www.youtube.com/watch?v=KR7KcaettM"
        );
    }

    #[test]
    fn test_short_link_keeps_other_params() {
        assert_eq!(
            normalize_url("https://youtu.be/KR7KcaettM?si=Xy12&t=42"),
            "https://www.youtube.com/watch?v=KR7KcaettM&t=42"
        );
    }

    #[test]
    fn test_watch_url_tracking_stripped() {
        assert_eq!(
            normalize_url("https://www.youtube.com/watch?v=abc123&si=zzz"),
            "https://www.youtube.com/watch?v=abc123"
        );
        assert_eq!(
            normalize_url("https://www.youtube.com/watch?si=zzz&v=abc123&list=PL1"),
            "https://www.youtube.com/watch?v=abc123&list=PL1"
        );
    }

    #[test]
    fn test_shorts_rewritten() {
        assert_eq!(
            normalize_url("https://youtube.com/shorts/abc123?feature=share"),
            "https://www.youtube.com/watch?v=abc123"
        );
    }

    #[test]
    fn test_clean_urls_unchanged() {
        let url = "https://www.youtube.com/watch?v=abc123&list=PL1";
        assert_eq!(normalize_url(url), url);
        assert_eq!(normalize_url("  https://m.youtube.com/watch?v=a  "), "https://m.youtube.com/watch?v=a");
    }

    #[test]
    fn test_malformed_and_foreign_pass_through() {
        assert_eq!(normalize_url("not a url"), "not a url");
        assert_eq!(normalize_url("https://youtu.be/"), "https://youtu.be/");
        assert_eq!(
            normalize_url("https://vimeo.com/123?si=abc"),
            "https://vimeo.com/123?si=abc"
        );
        assert_eq!(normalize_url(""), "");
    }
}
