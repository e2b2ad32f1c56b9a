//! Resolves the file the engine actually produced.
//!
//! yt-dlp does not report the final output path, and post-processing can
//! change the extension (or the site can hand back an image where a video was
//! requested). The locator first checks the predicted path and then falls
//! back to scanning the download directory for the job token prefix.

use std::path::{Path, PathBuf};

use crate::download::error::FetchError;
use crate::download::format::MediaKind;

/// What the produced file actually is, as far as its extension tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
    Image,
}

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Extensions yt-dlp leaves behind for unfinished downloads. Never delivered.
const PARTIAL_EXTS: &[&str] = &["part", "ytdl", "temp"];

/// Finds the file produced for `token` inside `dir`.
///
/// Checks `predicted` first (the cheap common case), then scans `dir` for any
/// non-partial file whose name starts with the token. Returns
/// [`FetchError::OutputMissing`] when nothing is found.
pub fn locate_output(dir: &Path, token: &str, predicted: &Path) -> Result<PathBuf, FetchError> {
    if predicted.is_file() {
        return Ok(predicted.to_path_buf());
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| FetchError::OutputMissing(format!("{token}: {e}")))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(token) {
            continue;
        }
        if is_partial(&path) {
            continue;
        }
        log::info!("Located output for job {} at {}", token, path.display());
        return Ok(path);
    }

    Err(FetchError::OutputMissing(token.to_string()))
}

/// True for yt-dlp intermediate files (.part and friends).
pub fn is_partial(path: &Path) -> bool {
    ext_of(path).map(|e| PARTIAL_EXTS.contains(&e.as_str())).unwrap_or(false)
}

/// Determines delivery type from the located file's extension.
///
/// Some extractors return a still image (e.g. a photo post) no matter what
/// was requested; those must be delivered as photos. Anything else is
/// trusted to match the requested kind.
pub fn classify_media(path: &Path, requested: MediaKind) -> MediaType {
    if let Some(ext) = ext_of(path) {
        if IMAGE_EXTS.contains(&ext.as_str()) {
            return MediaType::Image;
        }
    }
    match requested {
        MediaKind::Video => MediaType::Video,
        MediaKind::Audio => MediaType::Audio,
    }
}

fn ext_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_locate_predicted_path_wins() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("tok123.mp4");
        File::create(&predicted).unwrap();
        File::create(dir.path().join("tok123.webm")).unwrap();

        let found = locate_output(dir.path(), "tok123", &predicted).unwrap();
        assert_eq!(found, predicted);
    }

    #[test]
    fn test_locate_falls_back_to_prefix_scan() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("tok123.mp3");
        File::create(dir.path().join("tok123.m4a")).unwrap();
        File::create(dir.path().join("other456.mp3")).unwrap();

        let found = locate_output(dir.path(), "tok123", &predicted).unwrap();
        assert_eq!(found, dir.path().join("tok123.m4a"));
    }

    #[test]
    fn test_locate_skips_partial_files() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("tok123.mp4");
        File::create(dir.path().join("tok123.mp4.part")).unwrap();

        let err = locate_output(dir.path(), "tok123", &predicted).unwrap_err();
        assert!(matches!(err, FetchError::OutputMissing(_)));
    }

    #[test]
    fn test_locate_missing_reports_token() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("tok123.mp4");
        let err = locate_output(dir.path(), "tok123", &predicted).unwrap_err();
        match err {
            FetchError::OutputMissing(t) => assert_eq!(t, "tok123"),
            other => panic!("expected OutputMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_image_overrides_request() {
        let path = Path::new("/tmp/tok.JPG");
        assert_eq!(classify_media(path, MediaKind::Video), MediaType::Image);
        assert_eq!(classify_media(Path::new("/tmp/tok.webp"), MediaKind::Audio), MediaType::Image);
    }

    #[test]
    fn test_classify_trusts_requested_kind() {
        assert_eq!(classify_media(Path::new("/tmp/tok.mkv"), MediaKind::Video), MediaType::Video);
        assert_eq!(classify_media(Path::new("/tmp/tok.m4a"), MediaKind::Audio), MediaType::Audio);
    }
}
