// FormatSelector - turns resolved streams into the format listing
//
// Handles:
// - Video rows: mp4 with a picture, highest resolution first, one per resolution
// - Audio rows: audio-only streams, highest bitrate first, offered as MP3
// - Size labels in MB
// - Picking the audio track to mux with a video-only stream

use std::cmp::Ordering;
use std::collections::HashSet;

use super::models::{FormatEntry, FpsField, MediaKind, StreamDescriptor, VideoInfo};

/// Format selection helpers
pub struct FormatSelector;

impl FormatSelector {
    /// Build the `/get_formats` rows: video first, then audio.
    pub fn list_formats(info: &VideoInfo) -> Vec<FormatEntry> {
        let mut formats = Vec::new();

        let mut video: Vec<&StreamDescriptor> = info
            .streams
            .iter()
            .filter(|s| s.has_video && s.ext == "mp4" && s.resolution().is_some())
            .collect();
        // sort_by is stable, so extractor order breaks ties
        video.sort_by(|a, b| b.height.cmp(&a.height));

        let mut seen_resolutions = HashSet::new();
        for stream in video {
            let Some(resolution) = stream.resolution() else {
                continue;
            };
            if !seen_resolutions.insert(resolution.clone()) {
                continue;
            }
            formats.push(FormatEntry {
                itag: stream.itag,
                kind: MediaKind::Video,
                resolution,
                fps: FpsField::from_rate(stream.fps),
                size: Self::format_size(stream.effective_size()),
            });
        }

        let mut audio: Vec<&StreamDescriptor> =
            info.streams.iter().filter(|s| s.is_audio_only()).collect();
        audio.sort_by(|a, b| cmp_abr(b, a));

        for stream in audio {
            formats.push(FormatEntry {
                itag: stream.itag,
                kind: MediaKind::Audio,
                resolution: Self::audio_label(stream.abr),
                fps: FpsField::from_rate(None),
                size: Self::format_size(stream.effective_size()),
            });
        }

        formats
    }

    /// Audio track for muxing: audio-only, mp4/m4a container, highest bitrate
    pub fn best_audio(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        streams
            .iter()
            .filter(|s| s.is_audio_only() && matches!(s.ext.as_str(), "m4a" | "mp4"))
            // max_by keeps the last maximum; reverse so the first one wins
            .rev()
            .max_by(|a, b| cmp_abr(a, b))
    }

    /// Size label: "12.34 MB", or "Unknown"
    pub fn format_size(bytes: Option<u64>) -> String {
        match bytes {
            Some(b) if b > 0 => format!("{:.2} MB", b as f64 / 1_048_576.0),
            _ => "Unknown".to_string(),
        }
    }

    fn audio_label(abr: Option<f32>) -> String {
        match abr {
            Some(kbps) if kbps > 0.0 => format!("MP3 {}kbps", kbps.round() as u32),
            _ => "MP3 Audio".to_string(),
        }
    }
}

fn cmp_abr(a: &StreamDescriptor, b: &StreamDescriptor) -> Ordering {
    a.abr
        .unwrap_or(0.0)
        .partial_cmp(&b.abr.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_video_format(itag: u32, height: u32, ext: &str, with_audio: bool) -> StreamDescriptor {
        StreamDescriptor {
            itag,
            ext: ext.to_string(),
            height: Some(height),
            width: Some(height * 16 / 9),
            fps: Some(30.0),
            filesize: Some(u64::from(height) * 100_000),
            has_video: true,
            has_audio: with_audio,
            ..Default::default()
        }
    }

    fn make_audio_format(itag: u32, ext: &str, abr: Option<f32>) -> StreamDescriptor {
        StreamDescriptor {
            itag,
            ext: ext.to_string(),
            abr,
            has_audio: true,
            ..Default::default()
        }
    }

    fn info(streams: Vec<StreamDescriptor>) -> VideoInfo {
        VideoInfo {
            title: "t".to_string(),
            streams,
            ..Default::default()
        }
    }

    #[test]
    fn test_listing_order_and_dedup() {
        let formats = FormatSelector::list_formats(&info(vec![
            make_video_format(18, 360, "mp4", true),
            make_video_format(137, 1080, "mp4", false),
            make_video_format(248, 1080, "webm", false),
            make_video_format(136, 720, "mp4", false),
            make_video_format(22, 720, "mp4", true),
            make_audio_format(251, "webm", Some(160.0)),
            make_audio_format(140, "m4a", Some(129.5)),
            make_audio_format(139, "m4a", None),
        ]));

        let rows: Vec<(u32, MediaKind, &str)> = formats
            .iter()
            .map(|f| (f.itag, f.kind, f.resolution.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (137, MediaKind::Video, "1080p"),
                (136, MediaKind::Video, "720p"),
                (18, MediaKind::Video, "360p"),
                (251, MediaKind::Audio, "MP3 160kbps"),
                (140, MediaKind::Audio, "MP3 130kbps"),
                (139, MediaKind::Audio, "MP3 Audio"),
            ]
        );
        assert_eq!(formats[0].fps, FpsField::Rate(30));
        assert_eq!(formats[3].fps, FpsField::NotAvailable("N/A"));
        assert_eq!(formats[0].size, "103.00 MB");
        assert_eq!(formats[5].size, "Unknown");
    }

    #[test]
    fn test_empty_listing() {
        assert!(FormatSelector::list_formats(&info(vec![])).is_empty());
    }

    #[test]
    fn test_best_audio_prefers_mp4_container() {
        let streams = vec![
            make_audio_format(251, "webm", Some(160.0)),
            make_audio_format(139, "m4a", Some(48.0)),
            make_audio_format(140, "m4a", Some(129.5)),
            make_video_format(18, 360, "mp4", true),
        ];
        assert_eq!(FormatSelector::best_audio(&streams).map(|s| s.itag), Some(140));

        let webm_only = vec![make_audio_format(251, "webm", Some(160.0))];
        assert!(FormatSelector::best_audio(&webm_only).is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FormatSelector::format_size(Some(1_048_576)), "1.00 MB");
        assert_eq!(FormatSelector::format_size(Some(0)), "Unknown");
        assert_eq!(FormatSelector::format_size(None), "Unknown");
    }
}
