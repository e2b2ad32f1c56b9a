//! Download orchestration core: format resolution, the extraction engine
//! client, output location, progress throttling and the per-request job.

pub mod error;
pub mod format;
pub mod job;
pub mod locate;
pub mod progress;
pub mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::download::error::FetchError;
use crate::download::format::FormatSelection;
use crate::download::progress::ProgressEvent;

pub use ytdlp::YtDlpClient;

/// Display metadata returned by a probe. Held in the user's session between
/// the probe and their format choice.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Everything the engine needs for one fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    /// Output path template handed to the engine; the actual extension may
    /// differ after merge or transcode.
    pub output_template: PathBuf,
    pub format: FormatSelection,
    /// Hard byte ceiling; the engine refuses larger downloads up front when
    /// it knows the size.
    pub max_bytes: u64,
}

/// The extraction engine seam. The production implementation shells out to
/// yt-dlp; tests substitute a mock.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Validates the URL and returns display metadata. Writes no files.
    async fn probe(&self, url: &Url) -> Result<MediaInfo, FetchError>;

    /// Downloads (and optionally transcodes) the media to disk. Progress
    /// ticks are pushed into `progress` without blocking the engine; the
    /// produced file is resolved separately by the output locator.
    async fn fetch(
        &self,
        request: FetchRequest,
        progress: UnboundedSender<ProgressEvent>,
    ) -> Result<(), FetchError>;
}
