//! # Valuation - Requirement Scoring for Rendered Web Pages
//!
//! This crate evaluates a live web page, or a screenshot of it, against a
//! natural-language requirement. A language model produces a match score,
//! an analysis, and improvement suggestions, and a controller loop feeds that
//! feedback to a collaborating chat session until the page meets the bar.
//!
//! ## Features
//!
//! - Preview-aware content acquisition with retry and backoff
//! - Compact structural digests of HTML for prompting
//! - Screenshot capture through an external service
//! - Streaming model calls with tolerant result recovery
//! - Auto-evaluation controller with threshold branching and history
//! - HTTP API (`axum`) and a CLI
//!
//! ## Example
//!
//! ```rust,no_run
//! use valuation::acquirer::Acquirer;
//! use valuation::evaluation::{Evaluator, EvaluatorConfig, ValuationRequest};
//! use valuation::model::{GeminiClient, ModelConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini client with client-side rate limiting
//!     let model = GeminiClient::new_gemini_from_env(&ModelConfig::default())?;
//!     let evaluator = Evaluator::new(model, Acquirer::default(), EvaluatorConfig::default());
//!
//!     let request = ValuationRequest::new(
//!         "http://localhost:5173",
//!         "A login form centered on the page with a blue submit button",
//!     );
//!     let result = evaluator.evaluate_dom(&request).await?;
//!
//!     println!("{}% - {}", result.evaluation.match_score, result.evaluation.analysis);
//!     Ok(())
//! }
//! ```

mod error;
mod markdown;
pub mod model;

pub mod acquirer;
pub mod controller;
pub mod digest;
pub mod evaluation;
pub mod screenshot;
pub mod server;

pub use error::Error;
pub use markdown::{format_markdown, render_markdown};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::controller::{Controller, ControllerCommand, ControllerConfig, ValuationBackend};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::evaluation::{EvaluationResult, Evaluator, ValuationRequest, ValuationResult};
    pub use crate::model::{ChatMessage, StreamingModel};
}
