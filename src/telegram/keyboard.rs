//! Inline keyboards and callback code decoding.
//!
//! Callback data stays an opaque string on the wire; `CallbackAction::parse`
//! is the single place that decodes it.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::download::format::{AudioBitrate, Selection, VideoQuality};

pub const CB_TYPE_VIDEO: &str = "type_video";
pub const CB_TYPE_AUDIO: &str = "type_audio";
pub const CB_BACK_TO_MAIN: &str = "back_to_main";

/// A decoded callback press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    ChooseVideo,
    ChooseAudio,
    BackToMain,
    Quality(Selection),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            CB_TYPE_VIDEO => Some(Self::ChooseVideo),
            CB_TYPE_AUDIO => Some(Self::ChooseAudio),
            CB_BACK_TO_MAIN => Some(Self::BackToMain),
            _ => {
                if let Some(token) = data.strip_prefix("qv_") {
                    VideoQuality::parse(token).map(|q| Self::Quality(Selection::Video(q)))
                } else if let Some(token) = data.strip_prefix("qa_") {
                    AudioBitrate::parse(token).map(|b| Self::Quality(Selection::Audio(b)))
                } else {
                    None
                }
            }
        }
    }
}

/// Top-level menu: pick video or audio.
pub fn kind_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🎬 Video", CB_TYPE_VIDEO),
        InlineKeyboardButton::callback("🎵 Audio", CB_TYPE_AUDIO),
    ]])
}

/// Video quality tiers plus back navigation.
pub fn video_quality_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Best", "qv_best"),
            InlineKeyboardButton::callback("1080p", "qv_1080"),
            InlineKeyboardButton::callback("720p", "qv_720"),
        ],
        vec![
            InlineKeyboardButton::callback("480p", "qv_480"),
            InlineKeyboardButton::callback("360p", "qv_360"),
        ],
        vec![InlineKeyboardButton::callback("⬅️ Back", CB_BACK_TO_MAIN)],
    ])
}

/// Audio bitrate tiers plus back navigation.
pub fn audio_quality_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Best", "qa_best"),
            InlineKeyboardButton::callback("320 kbps", "qa_320"),
        ],
        vec![
            InlineKeyboardButton::callback("192 kbps", "qa_192"),
            InlineKeyboardButton::callback("128 kbps", "qa_128"),
        ],
        vec![InlineKeyboardButton::callback("⬅️ Back", CB_BACK_TO_MAIN)],
    ])
}
