//! yt-dlp backed implementation of the [`Extractor`] seam.
//!
//! `probe` runs `--dump-json` through the async process API under a timeout.
//! `fetch` runs the real download on a blocking worker so the line-by-line
//! stdout read does not stall the scheduler; progress crosses back over an
//! unbounded channel.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use url::Url;

use crate::core::config;
use crate::download::error::{classify_stderr, FetchError};
use crate::download::progress::{parse_progress, ProgressEvent};
use crate::download::{Extractor, FetchRequest, MediaInfo};

/// yt-dlp prints this and exits zero when `--max-filesize` rejects a file.
const SIZE_SKIP_MARKER: &str = "File is larger than max-filesize";

/// Per-site network tuning. Some sites serve generic clients an error page
/// or resolve IPv6 to dead endpoints; these overrides are applied to both
/// probe and fetch invocations.
struct SiteOverride {
    host_suffix: &'static str,
    user_agent: Option<&'static str>,
    force_ipv4: bool,
}

const SITE_OVERRIDES: &[SiteOverride] = &[SiteOverride {
    host_suffix: "tiktok.com",
    user_agent: Some("facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)"),
    force_ipv4: true,
}];

fn override_for(url: &Url) -> Option<&'static SiteOverride> {
    let host = url.host_str()?;
    SITE_OVERRIDES
        .iter()
        .find(|o| host == o.host_suffix || host.ends_with(&format!(".{}", o.host_suffix)))
}

fn push_override_args(args: &mut Vec<String>, url: &Url) {
    if let Some(site) = override_for(url) {
        if let Some(ua) = site.user_agent {
            args.push("--user-agent".to_string());
            args.push(ua.to_string());
        }
        if site.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
    }
}

/// Subset of the `--dump-json` output we care about.
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
}

/// The production extraction client.
pub struct YtDlpClient;

impl YtDlpClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for YtDlpClient {
    async fn probe(&self, url: &Url) -> Result<MediaInfo, FetchError> {
        let ytdl_bin = &*config::YTDL_BIN;
        let args = build_probe_args(url);

        log::debug!("yt-dlp probe: {} {}", ytdl_bin, args.join(" "));

        let output = timeout(
            config::engine::probe_timeout(),
            TokioCommand::new(ytdl_bin).args(&args).output(),
        )
        .await
        .map_err(|_| FetchError::Network("metadata probe timed out".to_string()))?
        .map_err(|e| FetchError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        // Playlists are suppressed, but some extractors still emit one JSON
        // object per line; the first is the requested entry.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout
            .lines()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| FetchError::Unsupported("no media found".to_string()))?;
        let parsed: ProbeOutput = serde_json::from_str(first_line)
            .map_err(|e| FetchError::Unsupported(format!("unreadable metadata: {e}")))?;

        Ok(MediaInfo {
            title: parsed.title.unwrap_or_else(|| "media".to_string()),
            thumbnail_url: parsed.thumbnail,
            duration_seconds: parsed.duration,
        })
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress: UnboundedSender<ProgressEvent>,
    ) -> Result<(), FetchError> {
        let ytdl_bin = config::YTDL_BIN.clone();
        let args = build_fetch_args(&request);

        let handle = tokio::task::spawn_blocking(move || {
            log::debug!("yt-dlp fetch: {} {}", ytdl_bin, args.join(" "));

            let mut child = Command::new(&ytdl_bin)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| FetchError::Spawn(e.to_string()))?;

            let stderr_tail = Arc::new(Mutex::new(VecDeque::<String>::new()));
            if let Some(stderr_stream) = child.stderr.take() {
                let tail = Arc::clone(&stderr_tail);
                thread::spawn(move || {
                    let reader = BufReader::new(stderr_stream);
                    for line in reader.lines().map_while(Result::ok) {
                        log::debug!("yt-dlp stderr: {}", line);
                        if let Ok(mut lines) = tail.lock() {
                            lines.push_back(line);
                            if lines.len() > 200 {
                                lines.pop_front();
                            }
                        }
                    }
                });
            }

            // Progress lines arrive on stdout thanks to --newline; the send
            // is a non-blocking enqueue, so the read loop never waits on the
            // consumer.
            let mut size_skipped = false;
            if let Some(stdout_stream) = child.stdout.take() {
                let reader = BufReader::new(stdout_stream);
                for line in reader.lines().map_while(Result::ok) {
                    if line.contains(SIZE_SKIP_MARKER) {
                        size_skipped = true;
                    }
                    if let Some(event) = parse_progress(&line) {
                        let _ = progress.send(event);
                    }
                }
            }

            let status = child
                .wait()
                .map_err(|e| FetchError::Engine(format!("engine process failed: {e}")))?;

            let stderr_text = stderr_tail
                .lock()
                .map(|mut lines| lines.make_contiguous().join("\n"))
                .unwrap_or_default();

            fetch_outcome(status.success(), size_skipped, &stderr_text, request.max_bytes)
        });

        handle
            .await
            .map_err(|e| FetchError::Engine(format!("fetch task failed: {e}")))?
    }
}

/// Decides a fetch's result from the engine's exit status and captured
/// output. A zero-exit run that skipped the download because of
/// `--max-filesize` is a size failure, not a success; the marker can land
/// on either stream depending on the yt-dlp version.
fn fetch_outcome(
    exited_ok: bool,
    size_skipped: bool,
    stderr_text: &str,
    max_bytes: u64,
) -> Result<(), FetchError> {
    if !exited_ok {
        return Err(classify_stderr(stderr_text));
    }
    if size_skipped || stderr_text.contains(SIZE_SKIP_MARKER) {
        return Err(FetchError::SizeExceeded {
            size_mb: None,
            limit_mb: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

fn build_probe_args(url: &Url) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        "--socket-timeout".to_string(),
        config::engine::SOCKET_TIMEOUT_SECS.to_string(),
        "--retries".to_string(),
        "2".to_string(),
    ];
    push_override_args(&mut args, url);
    args.push(url.as_str().to_string());
    args
}

fn build_fetch_args(request: &FetchRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-o".to_string(),
        request.output_template.display().to_string(),
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--format".to_string(),
        request.format.format_spec.clone(),
        "--concurrent-fragments".to_string(),
        "1".to_string(),
        "--fragment-retries".to_string(),
        config::engine::FRAGMENT_RETRIES.to_string(),
        "--retries".to_string(),
        config::engine::RETRIES.to_string(),
        "--socket-timeout".to_string(),
        config::engine::SOCKET_TIMEOUT_SECS.to_string(),
        "--max-filesize".to_string(),
        request.max_bytes.to_string(),
    ];

    if let Some(container) = request.format.merge_container {
        args.push("--merge-output-format".to_string());
        args.push(container.to_string());
    }
    if let Some(ref transcode) = request.format.audio_transcode {
        args.push("--extract-audio".to_string());
        args.push("--audio-format".to_string());
        args.push(transcode.codec.to_string());
        args.push("--audio-quality".to_string());
        args.push(format!("{}K", transcode.bitrate_kbps));
    }

    push_override_args(&mut args, &request.url);
    args.push(request.url.as_str().to_string());
    args
}

/// Reads the media duration via ffprobe; returns None when ffprobe is
/// missing or the container carries no duration.
pub fn probe_duration_seconds(path: &Path) -> Option<u32> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.trim().parse::<f64>().ok().map(|d| d.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::format::{resolve, Selection, VideoQuality};
    use std::path::PathBuf;

    fn req(url: &str, selection: Selection) -> FetchRequest {
        FetchRequest {
            url: Url::parse(url).unwrap(),
            output_template: PathBuf::from("/tmp/tok_media.%(ext)s"),
            format: resolve(selection),
            max_bytes: 50 * 1024 * 1024,
        }
    }

    #[test]
    fn test_fetch_args_video_merge() {
        let args = build_fetch_args(&req(
            "https://example.com/clip",
            Selection::Video(VideoQuality::P720),
        ));
        let joined = args.join(" ");
        assert!(joined.contains("--merge-output-format mp4"));
        assert!(joined.contains("bestvideo[height<=720]+bestaudio/best[height<=720]"));
        assert!(joined.contains("--max-filesize 52428800"));
        assert!(!joined.contains("--extract-audio"));
        assert_eq!(args.last().unwrap(), "https://example.com/clip");
    }

    #[test]
    fn test_fetch_args_audio_transcode() {
        use crate::download::format::AudioBitrate;
        let args = build_fetch_args(&req(
            "https://example.com/track",
            Selection::Audio(AudioBitrate::Kbps320),
        ));
        let joined = args.join(" ");
        assert!(joined.contains("--extract-audio"));
        assert!(joined.contains("--audio-format mp3"));
        assert!(joined.contains("--audio-quality 320K"));
        assert!(!joined.contains("--merge-output-format"));
    }

    #[test]
    fn test_site_override_applied_to_tiktok() {
        let url = Url::parse("https://www.tiktok.com/@user/video/123").unwrap();
        let mut args = vec![];
        push_override_args(&mut args, &url);
        assert!(args.iter().any(|a| a.starts_with("facebookexternalhit")));
        assert!(args.contains(&"--force-ipv4".to_string()));
    }

    #[test]
    fn test_no_override_for_unknown_host() {
        let url = Url::parse("https://example.com/clip").unwrap();
        let mut args = vec![];
        push_override_args(&mut args, &url);
        assert!(args.is_empty());
    }

    #[test]
    fn test_override_does_not_match_lookalike_host() {
        let url = Url::parse("https://eviltiktok.com/x").unwrap();
        assert!(override_for(&url).is_none());
    }

    const MAX: u64 = 50 * 1024 * 1024;

    #[test]
    fn test_zero_exit_size_skip_on_stdout_is_size_exceeded() {
        let result = fetch_outcome(true, true, "", MAX);
        assert_eq!(
            result,
            Err(FetchError::SizeExceeded { size_mb: None, limit_mb: 50 })
        );
    }

    #[test]
    fn test_zero_exit_size_skip_on_stderr_is_size_exceeded() {
        let stderr = "[download] clip: File is larger than max-filesize (52428800 bytes)";
        let result = fetch_outcome(true, false, stderr, MAX);
        assert_eq!(
            result,
            Err(FetchError::SizeExceeded { size_mb: None, limit_mb: 50 })
        );
    }

    #[test]
    fn test_nonzero_exit_classifies_stderr() {
        let result = fetch_outcome(false, false, "ERROR: Connection reset by peer", MAX);
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[test]
    fn test_clean_run_is_ok() {
        assert_eq!(fetch_outcome(true, false, "", MAX), Ok(()));
    }

    #[test]
    fn test_probe_args_do_not_download() {
        let url = Url::parse("https://example.com/clip").unwrap();
        let args = build_probe_args(&url);
        assert!(args.contains(&"--dump-json".to_string()));
        assert!(!args.iter().any(|a| a == "-o"));
    }
}
