//! Error types for the evaluation module

use thiserror::Error;

use crate::acquirer::AcquisitionError;
use crate::error::Error as CrateError;
use crate::model::ModelError;
use crate::screenshot::CaptureError;

/// Error type for evaluation requests
///
/// Parse failures never show up here; they become the fallback result.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Missing url or requirements
    #[error("{0}")]
    InvalidRequest(String),

    /// Page content could not be fetched
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Screenshot could not be captured
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Screenshot variant requested without a capture client
    #[error("Screenshot capture is not configured")]
    CaptureUnavailable,

    /// The model call could not be started
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<EvaluationError> for CrateError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::InvalidRequest(msg) => CrateError::InvalidRequest(msg),
            EvaluationError::Acquisition(e) => e.into(),
            EvaluationError::Capture(e) => e.into(),
            EvaluationError::Model(e) => e.into(),
            EvaluationError::CaptureUnavailable => {
                CrateError::Config("Screenshot capture is not configured".to_string())
            }
        }
    }
}
