use crate::download::error::FetchError;
use thiserror::Error;

/// Centralized error types for the application.
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic conversion and display
/// formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// The user's message did not contain a usable URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A format selection arrived with no active session for the user
    #[error("Session expired")]
    SessionExpired,

    /// Extraction engine errors (probe or fetch)
    #[error("Download error: {0}")]
    Download(#[from] FetchError),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The single short status line shown to the user for this failure.
    ///
    /// Engine error text is passed through verbatim (it is often actionable,
    /// e.g. "Private video"); internal diagnostics are never included.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidUrl(_) => {
                "Please send a valid URL starting with http:// or https://".to_string()
            }
            AppError::SessionExpired => "Session expired. Please send the link again.".to_string(),
            AppError::Download(e) => e.user_message(),
            AppError::Telegram(_) | AppError::Io(_) | AppError::Url(_) | AppError::Other(_) => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }
}
