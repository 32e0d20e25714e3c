//! Error types for the valuation crate

use thiserror::Error;

/// Result type for valuation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for valuation operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Content acquisition failed or exhausted its retries
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// Screenshot service rejected the capture
    #[error("Capture error: {0}")]
    Capture(String),

    /// The language model could not be reached
    #[error("Model error: {0}")]
    Model(String),

    /// Evaluation backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing configuration such as an API key
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal formatting error
    #[error("Markdown error: {0}")]
    Markdown(std::io::Error),

    /// Socket or file error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
