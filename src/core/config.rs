use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration constants for the bot

/// Cached yt-dlp binary path.
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp".
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Download folder path.
/// Read from DOWNLOAD_FOLDER environment variable, defaults to ~/downloads/loadra.
/// Supports tilde (~) expansion for home directory.
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/downloads/loadra".to_string()));

/// Log file path.
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE").unwrap_or_else(|_| "loadra.log".to_string()));

/// Returns the download folder with the tilde expanded.
pub fn download_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(&*DOWNLOAD_FOLDER).into_owned())
}

/// Transport limits
pub mod limits {
    /// Maximum file size the Telegram Bot API accepts from bots (50 MB).
    pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

    /// Maximum URL length accepted from users.
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Maximum length of the title part embedded in output filenames.
    pub const MAX_TITLE_STEM_CHARS: usize = 48;
}

/// Audio defaults
pub mod audio {
    /// Bitrate used when the user picks "Best Audio" (kbps).
    pub const DEFAULT_BITRATE_KBPS: u32 = 192;
}

/// Extraction engine tuning
pub mod engine {
    use super::Duration;

    /// Timeout for the metadata probe (no download happens, so keep it short).
    pub const PROBE_TIMEOUT_SECS: u64 = 30;

    /// Retry budget passed to yt-dlp for whole-file retries.
    pub const RETRIES: u32 = 10;

    /// Retry budget passed to yt-dlp for individual fragment failures.
    pub const FRAGMENT_RETRIES: u32 = 10;

    /// Socket timeout passed to yt-dlp (seconds).
    pub const SOCKET_TIMEOUT_SECS: u32 = 30;

    /// Probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }
}

/// Progress message configuration
pub mod progress {
    use super::Duration;

    /// Minimum interval between progress edits during download.
    pub const DOWNLOAD_INTERVAL_SECS: u64 = 2;

    /// Minimum interval between progress edits during upload.
    pub const UPLOAD_INTERVAL_SECS: u64 = 3;

    pub fn download_interval() -> Duration {
        Duration::from_secs(DOWNLOAD_INTERVAL_SECS)
    }

    pub fn upload_interval() -> Duration {
        Duration::from_secs(UPLOAD_INTERVAL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for the bot's HTTP client.
    /// Large enough to cover multi-minute uploads of ~50 MB video files.
    pub const REQUEST_TIMEOUT_SECS: u64 = 600;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_file_size_is_50_mb() {
        assert_eq!(limits::MAX_FILE_SIZE_BYTES, 52_428_800);
    }

    #[test]
    fn test_download_dir_expands_tilde() {
        let dir = download_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
    }
}
