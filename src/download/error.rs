//! Fetch error taxonomy and yt-dlp stderr classification.

use thiserror::Error;

/// Failures raised by the extraction engine (probe or fetch).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, connection resets, DNS failures
    #[error("Network error: {0}")]
    Network(String),

    /// The engine could not extract media from this URL
    #[error("Unsupported URL: {0}")]
    Unsupported(String),

    /// The media exceeds the size limit. `size_mb` is None when the engine
    /// refused the download up front without reporting the exact size.
    #[error("File too large (limit {limit_mb} MB)")]
    SizeExceeded { size_mb: Option<u64>, limit_mb: u64 },

    /// The engine exited successfully but no output file was found
    #[error("Output file not found for job {0}")]
    OutputMissing(String),

    /// Verbatim engine-reported error. Diagnostic only; never drives control
    /// flow decisions.
    #[error("{0}")]
    Engine(String),

    /// Failed to launch the engine binary at all
    #[error("Failed to start extraction engine: {0}")]
    Spawn(String),
}

impl FetchError {
    /// The single short status line shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Network(_) => {
                "Network problem while downloading. Please try again in a minute.".to_string()
            }
            FetchError::Unsupported(_) => {
                "Could not extract media from this link. The site may be unsupported or the content removed.".to_string()
            }
            FetchError::SizeExceeded { size_mb, limit_mb } => match size_mb {
                Some(size) => {
                    format!("The file is too large to send ({size} MB). The limit is {limit_mb} MB.")
                }
                None => format!("The file is larger than the {limit_mb} MB limit."),
            },
            FetchError::OutputMissing(_) => {
                "Download finished but the file could not be found. Please try again.".to_string()
            }
            FetchError::Engine(detail) => format!("Download failed: {detail}"),
            FetchError::Spawn(_) => {
                "The download engine is unavailable right now. Please try again later.".to_string()
            }
        }
    }
}

/// Classifies yt-dlp stderr output into the fetch error taxonomy.
///
/// Matching is case-insensitive substring search; the last stderr lines are
/// what the engine prints its `ERROR:` summary to, so the caller should pass
/// the tail of the stream.
pub fn classify_stderr(stderr: &str) -> FetchError {
    let lower = stderr.to_lowercase();

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("failed to connect")
        || lower.contains("network is unreachable")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("socket error")
    {
        return FetchError::Network(last_error_line(stderr));
    }

    if lower.contains("unsupported url")
        || lower.contains("no video formats found")
        || lower.contains("no media found")
        || lower.contains("unable to extract")
        || lower.contains("is not a valid url")
    {
        return FetchError::Unsupported(last_error_line(stderr));
    }

    FetchError::Engine(last_error_line(stderr))
}

/// Pulls the most recent `ERROR:` line out of stderr, falling back to the
/// last non-empty line, so user-visible text stays one line long.
fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .map(|l| l.trim_start_matches("ERROR:").trim())
        .or_else(|| lines.last().copied())
        .unwrap_or("unknown engine error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_network_errors() {
        let err = classify_stderr("ERROR: Unable to download webpage: The read operation timed out");
        assert!(matches!(err, FetchError::Network(_)));

        let err = classify_stderr("ERROR: Connection reset by peer");
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[test]
    fn test_classify_unsupported() {
        let err = classify_stderr("ERROR: Unsupported URL: https://example.com/page");
        assert!(matches!(err, FetchError::Unsupported(_)));

        let err = classify_stderr("ERROR: [generic] page: Unable to extract title");
        assert!(matches!(err, FetchError::Unsupported(_)));
    }

    #[test]
    fn test_classify_unknown_falls_through_to_engine() {
        let err = classify_stderr("ERROR: Private video. Sign in if you've been granted access");
        match err {
            FetchError::Engine(detail) => assert!(detail.contains("Private video")),
            other => panic!("expected Engine, got {other:?}"),
        }
    }

    #[test]
    fn test_last_error_line_prefers_error_prefix() {
        let stderr = "WARNING: something minor\nERROR: the real problem\n";
        assert_eq!(last_error_line(stderr), "the real problem");
    }

    #[test]
    fn test_last_error_line_empty_input() {
        assert_eq!(last_error_line(""), "unknown engine error");
    }

    #[test]
    fn test_size_exceeded_message_includes_both_sizes() {
        let err = FetchError::SizeExceeded { size_mb: Some(80), limit_mb: 50 };
        let msg = err.user_message();
        assert!(msg.contains("80"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn test_size_exceeded_without_known_size() {
        let err = FetchError::SizeExceeded { size_mb: None, limit_mb: 50 };
        assert!(err.user_message().contains("50 MB limit"));
    }
}
