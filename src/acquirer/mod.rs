//! # Content Acquirer Module
//!
//! This module fetches the content that gets evaluated. It is the first stage
//! of the valuation pipeline and feeds raw markup to the digest extractor.
//!
//! ## Key Components
//!
//! - `Acquirer`: Fetches content for a URL, with preview-aware retry
//! - `AcquirerConfig`: Retry budget, backoff curve and readiness heuristics
//! - `AcquisitionError`: Failures surfaced once retries are exhausted
//!
//! ## Preview targets
//!
//! Loopback and `preview` hosts serve output from a build that may still be
//! running. For those the acquirer prefers an inline `srcdoc` frame, then an
//! external frame document, then a cascade of likely content regions, and
//! polls with exponential backoff until the result looks rendered.

mod config;
mod error;
mod extraction;
mod fetch;

pub use config::{AcquirerConfig, AcquirerConfigBuilder, DEFAULT_USER_AGENT};
pub use error::AcquisitionError;
pub use extraction::{extract_tag, is_preview_target};
pub use fetch::Acquirer;
