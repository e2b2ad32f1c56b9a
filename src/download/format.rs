//! Pure mapping from the user's (kind, quality) choice to
//! yt-dlp configuration.
//!
//! No network or disk access happens here; everything is a deterministic
//! string computation so the whole component is unit-testable.

use crate::core::config;

/// Target container for merged video downloads. Fixed so the output locator
/// can predict the produced extension.
pub const VIDEO_CONTAINER: &str = "mp4";

/// Target extension after audio extraction.
pub const AUDIO_EXT: &str = "mp3";

/// What kind of media the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Video quality tiers offered in the quality keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    Best,
    P1080,
    P720,
    P480,
    P360,
}

impl VideoQuality {
    /// Parse from the quality token used in callback codes ("best", "720", ...).
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "best" => Some(Self::Best),
            "1080" => Some(Self::P1080),
            "720" => Some(Self::P720),
            "480" => Some(Self::P480),
            "360" => Some(Self::P360),
            _ => None,
        }
    }

    /// Vertical resolution cap, or None for Best.
    pub fn height_cap(self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
        }
    }

    /// Human-readable label ("Best", "720p", ...).
    pub fn label(self) -> &'static str {
        match self {
            Self::Best => "Best",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
        }
    }
}

/// Audio bitrate tiers offered in the quality keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBitrate {
    Best,
    Kbps320,
    Kbps192,
    Kbps128,
}

impl AudioBitrate {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "best" => Some(Self::Best),
            "320" => Some(Self::Kbps320),
            "192" => Some(Self::Kbps192),
            "128" => Some(Self::Kbps128),
            _ => None,
        }
    }

    /// Target bitrate in kbps. "Best" maps to the configured default.
    pub fn kbps(self) -> u32 {
        match self {
            Self::Best => config::audio::DEFAULT_BITRATE_KBPS,
            Self::Kbps320 => 320,
            Self::Kbps192 => 192,
            Self::Kbps128 => 128,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Best => "Best",
            Self::Kbps320 => "320 kbps",
            Self::Kbps192 => "192 kbps",
            Self::Kbps128 => "128 kbps",
        }
    }
}

/// The user's complete format choice: kind plus quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Video(VideoQuality),
    Audio(AudioBitrate),
}

impl Selection {
    pub fn kind(self) -> MediaKind {
        match self {
            Self::Video(_) => MediaKind::Video,
            Self::Audio(_) => MediaKind::Audio,
        }
    }

    /// Label used in status messages, e.g. "video (720p)" or "audio (192 kbps)".
    pub fn label(self) -> String {
        match self {
            Self::Video(q) => format!("video ({})", q.label()),
            Self::Audio(b) => format!("audio ({})", b.label()),
        }
    }

    /// Extension the produced file is predicted to carry.
    pub fn predicted_ext(self) -> &'static str {
        match self.kind() {
            MediaKind::Video => VIDEO_CONTAINER,
            MediaKind::Audio => AUDIO_EXT,
        }
    }
}

/// Audio post-processing directive handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    /// Target codec as yt-dlp knows it.
    pub codec: &'static str,
    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,
}

/// Resolved engine-facing format configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    /// yt-dlp `--format` specification string.
    pub format_spec: String,
    /// Container for `--merge-output-format`; None for audio requests.
    pub merge_container: Option<&'static str>,
    /// Audio extraction/transcode directive; None for video requests.
    pub audio_transcode: Option<AudioTranscode>,
}

/// Maps a selection to its yt-dlp format specification.
///
/// Video specs always carry a single-combined-stream fallback after the `/`
/// for sites that do not support separate-stream merging.
pub fn resolve(selection: Selection) -> FormatSelection {
    match selection {
        Selection::Audio(bitrate) => FormatSelection {
            format_spec: "bestaudio/best".to_string(),
            merge_container: None,
            audio_transcode: Some(AudioTranscode {
                codec: AUDIO_EXT,
                bitrate_kbps: bitrate.kbps(),
            }),
        },
        Selection::Video(quality) => {
            let format_spec = match quality.height_cap() {
                None => "bestvideo+bestaudio/best".to_string(),
                Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
            };
            FormatSelection {
                format_spec,
                merge_container: Some(VIDEO_CONTAINER),
                audio_transcode: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_audio_spec_never_selects_video() {
        for bitrate in [
            AudioBitrate::Best,
            AudioBitrate::Kbps320,
            AudioBitrate::Kbps192,
            AudioBitrate::Kbps128,
        ] {
            let resolved = resolve(Selection::Audio(bitrate));
            assert!(!resolved.format_spec.contains("bestvideo"));
            assert!(resolved.merge_container.is_none());
            let transcode = resolved.audio_transcode.unwrap();
            assert_eq!(transcode.codec, "mp3");
        }
    }

    #[test]
    fn test_audio_best_uses_default_bitrate() {
        let resolved = resolve(Selection::Audio(AudioBitrate::Best));
        assert_eq!(resolved.audio_transcode.unwrap().bitrate_kbps, 192);
    }

    #[test]
    fn test_video_best_merges_with_fallback() {
        let resolved = resolve(Selection::Video(VideoQuality::Best));
        assert_eq!(resolved.format_spec, "bestvideo+bestaudio/best");
        assert_eq!(resolved.merge_container, Some("mp4"));
        assert!(resolved.audio_transcode.is_none());
    }

    #[test]
    fn test_video_height_caps() {
        for (quality, h) in [
            (VideoQuality::P1080, 1080),
            (VideoQuality::P720, 720),
            (VideoQuality::P480, 480),
            (VideoQuality::P360, 360),
        ] {
            let resolved = resolve(Selection::Video(quality));
            assert_eq!(
                resolved.format_spec,
                format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]")
            );
            // Fallback present for sites without separate-stream merging
            assert!(resolved.format_spec.contains('/'));
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = resolve(Selection::Video(VideoQuality::P720));
        let b = resolve(Selection::Video(VideoQuality::P720));
        assert_eq!(a, b);
    }

    #[test]
    fn test_quality_token_parsing() {
        assert_eq!(VideoQuality::parse("720"), Some(VideoQuality::P720));
        assert_eq!(VideoQuality::parse("best"), Some(VideoQuality::Best));
        assert_eq!(VideoQuality::parse("4320"), None);
        assert_eq!(AudioBitrate::parse("128"), Some(AudioBitrate::Kbps128));
        assert_eq!(AudioBitrate::parse("64"), None);
    }

    #[test]
    fn test_predicted_extensions() {
        assert_eq!(Selection::Video(VideoQuality::Best).predicted_ext(), "mp4");
        assert_eq!(Selection::Audio(AudioBitrate::Best).predicted_ext(), "mp3");
    }
}
