//! # Evaluation Module
//!
//! Turns a `ValuationRequest` into a scored `ValuationResult` by asking a
//! language model to compare page content with the requirements.
//!
//! ## Key Components
//!
//! - `Evaluator`: DOM and screenshot variants of the evaluation call
//! - `EvaluatorConfig`: Selector default, screenshot settings, suggestions policy
//! - `recover_evaluation`: Never-failing parse of free-form model output
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
//!     let model = GeminiClient::new_gemini_from_env(&ModelConfig::default())?;
//!     let evaluator = Evaluator::new(model, Acquirer::default(), EvaluatorConfig::default());
//!
//!     let request = ValuationRequest::new("http://localhost:5173", "A centered login form");
//!     let result = evaluator.evaluate_dom(&request).await?;
//!     println!("{}%", result.evaluation.match_score);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod evaluator;
mod parse;
mod prompt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use config::{DEFAULT_SELECTOR, EmptySuggestions, EvaluatorConfig, EvaluatorConfigBuilder};
pub use error::EvaluationError;
pub use evaluator::Evaluator;
pub use parse::{
    FALLBACK_ANALYSIS, FALLBACK_SUGGESTIONS, NO_ANALYSIS, NO_SUGGESTIONS, recover_evaluation,
};
pub use prompt::{dom_messages, screenshot_messages};

/// Input to an evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub initial_requirements: String,

    /// Pre-fetched markup; skips acquisition when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Tag or region hint for the acquirer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Treat an explicit `null` like a missing field so `validate` reports it
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ValuationRequest {
    pub fn new(url: impl Into<String>, initial_requirements: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            initial_requirements: initial_requirements.into(),
            ..Default::default()
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Check that both url and requirements are present
    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.url.trim().is_empty() {
            return Err(EvaluationError::InvalidRequest("URL is required".to_string()));
        }
        if self.initial_requirements.trim().is_empty() {
            return Err(EvaluationError::InvalidRequest(
                "Initial requirements are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Score, analysis and suggestions for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Always within 0..=100
    #[serde(serialize_with = "whole_score_as_integer")]
    pub match_score: f64,
    pub analysis: String,
    pub suggestions: Vec<String>,
}

/// Whole scores go on the wire as `92`, not `92.0`
fn whole_score_as_integer<S>(score: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if score.is_finite() && score.fract() == 0.0 {
        serializer.serialize_i64(*score as i64)
    } else {
        serializer.serialize_f64(*score)
    }
}

impl EvaluationResult {
    /// Build a result, clamping the score into range
    pub fn new(match_score: f64, analysis: String, suggestions: Vec<String>) -> Self {
        let match_score = if match_score.is_nan() {
            0.0
        } else {
            match_score.clamp(0.0, 100.0)
        };
        Self {
            match_score,
            analysis,
            suggestions,
        }
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.match_score)
    }
}

/// What was evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValuationTarget {
    Url(String),
    /// Data URL of the captured image
    Screenshot(String),
}

/// An evaluation tied to the content it was made from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    #[serde(flatten)]
    pub target: ValuationTarget,
    pub evaluation: EvaluationResult,
}

impl ValuationResult {
    pub fn for_url(url: impl Into<String>, evaluation: EvaluationResult) -> Self {
        Self {
            target: ValuationTarget::Url(url.into()),
            evaluation,
        }
    }

    pub fn for_screenshot(data_url: impl Into<String>, evaluation: EvaluationResult) -> Self {
        Self {
            target: ValuationTarget::Screenshot(data_url.into()),
            evaluation,
        }
    }

    pub fn score(&self) -> f64 {
        self.evaluation.match_score
    }
}

/// A completed run as kept in the controller history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationHistoryItem {
    pub timestamp: DateTime<Utc>,
    pub result: ValuationResult,
}

impl ValuationHistoryItem {
    pub fn now(result: ValuationResult) -> Self {
        Self {
            timestamp: Utc::now(),
            result,
        }
    }
}

/// Coarse grouping of scores for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// 80 and above
    High,
    /// 50 to 79
    Medium,
    Low,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreBand::High
        } else if score >= 50.0 {
            ScoreBand::Medium
        } else {
            ScoreBand::Low
        }
    }
}
