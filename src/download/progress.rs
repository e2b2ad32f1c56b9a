//! Turns the engine's high-frequency progress stream
//! into a bounded, monotonic sequence of status strings.
//!
//! Pure state plus a decision function: the throttler never touches the
//! transport, so policies are testable with an injected clock.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration, Instant};

use crate::core::config;

/// Which phase a progress tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Downloading,
    Uploading,
}

/// A single progress tick, normalized to a 0..=1 fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub fraction: f64,
}

impl ProgressEvent {
    pub fn new(phase: ProgressPhase, fraction: f64) -> Self {
        Self { phase, fraction: fraction.clamp(0.0, 1.0) }
    }

    pub fn percent(&self) -> u32 {
        (self.fraction * 100.0).round() as u32
    }
}

// yt-dlp colors its progress lines; the codes must go before numeric parsing.
#[allow(clippy::expect_used)]
static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ANSI escape regex is valid"));

#[allow(clippy::expect_used)]
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("percent regex is valid"));

/// Parses one stdout line from the engine into a download progress event.
///
/// Returns None for lines that are not `[download]  42.5% ...` progress
/// reports (merge output, warnings, already-downloaded notices).
pub fn parse_progress(line: &str) -> Option<ProgressEvent> {
    let clean = ANSI_RE.replace_all(line, "");
    if !clean.contains("[download]") {
        return None;
    }
    let caps = PERCENT_RE.captures(&clean)?;
    let pct: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(ProgressEvent::new(ProgressPhase::Downloading, pct / 100.0))
}

/// Renders the 10-segment quantized progress bar.
pub fn render_bar(percent: u32) -> String {
    let filled = (percent.min(100) / 10) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn render_status(event: &ProgressEvent) -> String {
    let pct = event.percent();
    let verb = match event.phase {
        ProgressPhase::Downloading => "Downloading",
        ProgressPhase::Uploading => "Uploading",
    };
    format!("{verb}... {} {pct}%", render_bar(pct))
}

/// Rate-limiting state for one job's status messages.
///
/// Download policy: at most one emission per interval. Upload policy: also
/// emits on a new multiple-of-ten boundary or at 100%, so visible step
/// changes get through even under the longer interval. Emission is
/// idempotent (identical text is never emitted twice in a row) and
/// monotonic (a lower percentage than the last emitted one is dropped).
pub struct ProgressThrottler {
    last_emit: Option<Instant>,
    last_text: Option<String>,
    last_percent: u32,
}

impl ProgressThrottler {
    pub fn new() -> Self {
        Self { last_emit: None, last_text: None, last_percent: 0 }
    }

    fn interval(phase: ProgressPhase) -> Duration {
        match phase {
            ProgressPhase::Downloading => config::progress::download_interval(),
            ProgressPhase::Uploading => config::progress::upload_interval(),
        }
    }

    /// Decides whether this tick becomes an outbound status string.
    pub fn update(&mut self, event: &ProgressEvent, now: Instant) -> Option<String> {
        let percent = event.percent();
        if self.last_emit.is_some() && percent < self.last_percent {
            return None;
        }

        let interval_elapsed = match self.last_emit {
            None => true,
            Some(at) => now.duration_since(at) >= Self::interval(event.phase),
        };

        let due = match event.phase {
            ProgressPhase::Downloading => interval_elapsed,
            ProgressPhase::Uploading => {
                interval_elapsed
                    || percent / 10 > self.last_percent / 10
                    || (percent == 100 && self.last_percent != 100)
            }
        };
        if !due {
            return None;
        }

        let text = render_status(event);
        if self.last_text.as_deref() == Some(text.as_str()) {
            return None;
        }

        self.last_emit = Some(now);
        self.last_percent = percent;
        self.last_text = Some(text.clone());
        Some(text)
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dl(pct: f64) -> ProgressEvent {
        ProgressEvent::new(ProgressPhase::Downloading, pct / 100.0)
    }

    fn up(pct: f64) -> ProgressEvent {
        ProgressEvent::new(ProgressPhase::Uploading, pct / 100.0)
    }

    #[test]
    fn test_parse_progress_plain_line() {
        let event = parse_progress("[download]  42.5% of 10.00MiB at 1.00MiB/s ETA 00:06").unwrap();
        assert_eq!(event.phase, ProgressPhase::Downloading);
        assert_eq!(event.percent(), 43);
    }

    #[test]
    fn test_parse_progress_strips_ansi() {
        let line = "\x1b[0;94m[download]\x1b[0m \x1b[0;32m 55.0%\x1b[0m of ~3.50MiB";
        let event = parse_progress(line).unwrap();
        assert_eq!(event.percent(), 55);
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert!(parse_progress("[Merger] Merging formats into \"out.mp4\"").is_none());
        assert!(parse_progress("[download] Destination: out.f137.mp4").is_none());
    }

    #[test]
    fn test_render_bar_quantized() {
        assert_eq!(render_bar(0), "░░░░░░░░░░");
        assert_eq!(render_bar(55), "█████░░░░░");
        assert_eq!(render_bar(100), "██████████");
    }

    #[test]
    fn test_download_policy_bounded_by_interval() {
        let mut throttler = ProgressThrottler::new();
        let start = Instant::now();
        let mut emitted = 0;
        // 200 ticks spread across one second: only the first gets through,
        // since the download interval is two seconds.
        for i in 0..200u32 {
            let now = start + Duration::from_millis(i as u64 * 5);
            if throttler.update(&dl(f64::from(i) / 2.0), now).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
    }

    #[test]
    fn test_download_policy_emits_after_interval() {
        let mut throttler = ProgressThrottler::new();
        let start = Instant::now();
        assert!(throttler.update(&dl(10.0), start).is_some());
        assert!(throttler.update(&dl(20.0), start + Duration::from_secs(1)).is_none());
        assert!(throttler.update(&dl(30.0), start + Duration::from_secs(2)).is_some());
    }

    #[test]
    fn test_upload_policy_tens_boundary_beats_interval() {
        let mut throttler = ProgressThrottler::new();
        let start = Instant::now();
        let mut emitted = vec![];
        for pct in [5.0, 12.0, 19.0, 30.0, 41.0] {
            // All within the same instant: the time gate never opens.
            if throttler.update(&up(pct), start).is_some() {
                emitted.push(pct as u32);
            }
        }
        // First tick always emits; 12, 30 and 41 cross new tens boundaries
        // relative to the previous emission; 19 stays inside 12's decade.
        assert_eq!(emitted, vec![5, 12, 30, 41]);
    }

    #[test]
    fn test_upload_policy_completion_always_emits() {
        let mut throttler = ProgressThrottler::new();
        let start = Instant::now();
        assert!(throttler.update(&up(95.0), start).is_some());
        assert!(throttler.update(&up(100.0), start).is_some());
    }

    #[test]
    fn test_idempotent_identical_text() {
        let mut throttler = ProgressThrottler::new();
        let start = Instant::now();
        assert!(throttler.update(&dl(50.0), start).is_some());
        // Same percent after the interval renders identical text: suppressed.
        assert!(throttler.update(&dl(50.0), start + Duration::from_secs(3)).is_none());
    }

    #[test]
    fn test_monotonic_suppresses_regression() {
        let mut throttler = ProgressThrottler::new();
        let start = Instant::now();
        assert!(throttler.update(&dl(60.0), start).is_some());
        assert!(throttler.update(&dl(40.0), start + Duration::from_secs(5)).is_none());
        assert!(throttler.update(&dl(70.0), start + Duration::from_secs(5)).is_some());
    }
}
