//! One job invocation per accepted format choice.
//!
//! Drives probe → fetch → locate → size check → deliver, with progress
//! relayed through the throttler and temp files removed on every exit path
//! by an RAII guard.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;
use uuid::Uuid;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::title_stem;
use crate::download::error::FetchError;
use crate::download::format::{resolve, Selection};
use crate::download::locate::{classify_media, locate_output, MediaType};
use crate::download::progress::ProgressThrottler;
use crate::download::ytdlp::probe_duration_seconds;
use crate::download::{Extractor, FetchRequest};

/// Outcome of handing a file to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The acknowledgment was lost; the bytes may still have arrived.
    TimedOut,
}

/// The finished file and its send metadata.
#[derive(Debug)]
pub struct DeliveryFile<'a> {
    pub path: &'a Path,
    pub media: MediaType,
    pub title: &'a str,
    pub duration_seconds: Option<u32>,
    /// Cover art URL from the probe; attached to audio sends.
    pub thumbnail_url: Option<&'a str>,
}

/// Outbound side of a job: one editable status line plus final delivery.
/// The production implementation edits a Telegram message; tests record
/// calls instead.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn update_status(&self, text: &str) -> AppResult<()>;
    async fn deliver(&self, file: DeliveryFile<'_>) -> AppResult<Delivery>;
}

/// One accepted download: the session's URL and title plus the user's
/// format choice.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub url: Url,
    pub title: String,
    pub selection: Selection,
    /// Duration from the probe; used when ffprobe cannot read the file.
    pub duration_hint: Option<f64>,
    /// Thumbnail from the probe; shown as cover art on audio sends.
    pub thumbnail_url: Option<String>,
}

/// Removes every file carrying this job's token when dropped, including
/// yt-dlp partials. Deletion is best-effort: failures are logged only.
struct JobFiles {
    dir: PathBuf,
    token: String,
}

impl JobFiles {
    fn new(dir: PathBuf, token: String) -> Self {
        Self { dir, token }
    }
}

impl Drop for JobFiles {
    fn drop(&mut self) {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(&self.token) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed job file {}", path.display()),
                Err(e) => log::warn!("Failed to remove job file {}: {}", path.display(), e),
            }
        }
    }
}

/// Runs one download job to completion.
///
/// Every failure becomes exactly one status edit with a short reason; the
/// job's temp files are gone by the time this returns, whatever the path.
pub async fn run_job<E, T>(extractor: Arc<E>, transport: Arc<T>, request: JobRequest) -> AppResult<()>
where
    E: Extractor + ?Sized + 'static,
    T: Transport + ?Sized + 'static,
{
    let result = execute(extractor, Arc::clone(&transport), &request).await;
    if let Err(ref err) = result {
        log::error!("Download job failed for {}: {}", request.url, err);
        if let Err(e) = transport.update_status(&err.user_message()).await {
            log::warn!("Failed to report job failure: {}", e);
        }
    }
    result
}

async fn execute<E, T>(extractor: Arc<E>, transport: Arc<T>, request: &JobRequest) -> AppResult<()>
where
    E: Extractor + ?Sized + 'static,
    T: Transport + ?Sized + 'static,
{
    let dir = config::download_dir();
    tokio::fs::create_dir_all(&dir).await?;

    // Tokens are never reused, so concurrent jobs sharing the directory
    // cannot collide even for identical titles.
    let token = Uuid::new_v4().simple().to_string();
    let stem = format!("{}_{}", token, title_stem(&request.title));
    let template = dir.join(format!("{stem}.%(ext)s"));
    let format = resolve(request.selection);
    let predicted = dir.join(format!("{stem}.{}", request.selection.predicted_ext()));

    let _guard = JobFiles::new(dir.clone(), token.clone());

    log::info!(
        "Starting job {} for {} as {}",
        token,
        request.url,
        request.selection.label()
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress_transport = Arc::clone(&transport);
    let progress_task = tokio::spawn(async move {
        let mut throttler = ProgressThrottler::new();
        while let Some(event) = rx.recv().await {
            if let Some(text) = throttler.update(&event, Instant::now()) {
                if let Err(e) = progress_transport.update_status(&text).await {
                    log::warn!("Failed to edit progress message: {}", e);
                }
            }
        }
    });

    let fetch_result = extractor
        .fetch(
            FetchRequest {
                url: request.url.clone(),
                output_template: template,
                format,
                max_bytes: config::limits::MAX_FILE_SIZE_BYTES,
            },
            tx,
        )
        .await;

    // The sender is consumed by fetch, so the relay drains and exits here;
    // waiting for it keeps failure edits from racing a late progress edit.
    let _ = progress_task.await;
    fetch_result.map_err(AppError::Download)?;

    let path = locate_output(&dir, &token, &predicted).map_err(AppError::Download)?;

    let size = tokio::fs::metadata(&path).await?.len();
    if size > config::limits::MAX_FILE_SIZE_BYTES {
        return Err(AppError::Download(FetchError::SizeExceeded {
            size_mb: Some(size / (1024 * 1024)),
            limit_mb: config::limits::MAX_FILE_SIZE_BYTES / (1024 * 1024),
        }));
    }

    let media = classify_media(&path, request.selection.kind());
    let duration_seconds = {
        let probe_path = path.clone();
        tokio::task::spawn_blocking(move || probe_duration_seconds(&probe_path))
            .await
            .ok()
            .flatten()
            .or_else(|| request.duration_hint.map(|d| d.round() as u32))
    };

    transport.update_status("Uploading...").await?;

    let delivery = transport
        .deliver(DeliveryFile {
            path: &path,
            media,
            title: &request.title,
            duration_seconds,
            thumbnail_url: request.thumbnail_url.as_deref(),
        })
        .await?;

    match delivery {
        Delivery::Sent => {
            log::info!("Job {} delivered ({} bytes)", token, size);
        }
        Delivery::TimedOut => {
            log::warn!("Job {} upload timed out; delivery status unknown", token);
            transport
                .update_status("Upload is taking longer than expected. The file might still appear shortly.")
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_job_files_removes_token_prefixed_only() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("tok1_clip.mp4")).unwrap();
        File::create(dir.path().join("tok1_clip.mp4.part")).unwrap();
        File::create(dir.path().join("tok2_other.mp4")).unwrap();

        drop(JobFiles::new(dir.path().to_path_buf(), "tok1".to_string()));

        assert!(!dir.path().join("tok1_clip.mp4").exists());
        assert!(!dir.path().join("tok1_clip.mp4.part").exists());
        assert!(dir.path().join("tok2_other.mp4").exists());
    }

    #[test]
    fn test_job_files_tolerates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("nope");
        // Must not panic.
        drop(JobFiles::new(gone, "tok".to_string()));
    }
}
