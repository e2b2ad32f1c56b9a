//! loadra: a Telegram bot that downloads video and audio via yt-dlp.
//!
//! The library splits into three layers:
//! - [`core`]: configuration, errors, logging and small helpers.
//! - [`download`]: the orchestration core: format resolution, the yt-dlp
//!   client, output location, progress throttling and the per-request job.
//! - [`telegram`]: bot setup, session state, keyboards and handlers.

pub mod cli;
pub mod core;
pub mod download;
pub mod telegram;

pub use self::core::{config, AppError, AppResult};
pub use download::{Extractor, MediaInfo, YtDlpClient};
pub use telegram::{create_bot, Bot};
