//! Error types for the acquirer module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for content acquisition
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Target answered with a non-success status
    #[error("Failed to fetch HTML: {status} {reason}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
    },

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Every attempt completed without producing usable content
    #[error("Failed to fetch preview content after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
    },
}

impl AcquisitionError {
    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

impl From<AcquisitionError> for CrateError {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::Http(e) => CrateError::Http(e),
            _ => CrateError::Acquisition(err.to_string()),
        }
    }
}
