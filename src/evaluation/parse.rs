//! Recovery of a structured result from free-form model output

use serde_json::Value;
use tracing::{debug, warn};

use super::EvaluationResult;
use super::config::EmptySuggestions;

pub const FALLBACK_ANALYSIS: &str = "The evaluation could not be completed. The preview content may not be fully loaded yet or may be in an unexpected format.";

pub const FALLBACK_SUGGESTIONS: [&str; 3] = [
    "Wait for the preview to fully load",
    "Try refreshing the page",
    "Check if the preview is displaying correctly",
];

pub const NO_ANALYSIS: &str = "No analysis provided";

pub const NO_SUGGESTIONS: &str = "No suggestions provided";

/// Recover `{matchScore, analysis, suggestions}` from `text`.
///
/// Never fails. Text without a parseable `{...}` span yields the fallback
/// result and the raw text is logged.
pub fn recover_evaluation(text: &str, policy: EmptySuggestions) -> EvaluationResult {
    let parsed = json_span(text).and_then(|span| match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(fields)) => Some(fields),
        Ok(_) => None,
        Err(e) => {
            debug!("Evaluation JSON did not parse: {}", e);
            None
        }
    });

    let Some(fields) = parsed else {
        warn!(raw = %text, "Error parsing evaluation result");
        return fallback();
    };

    let match_score = fields.get("matchScore").map(score).unwrap_or(0.0);
    let analysis = match fields.get("analysis") {
        Some(Value::String(analysis)) if !analysis.is_empty() => analysis.clone(),
        _ => NO_ANALYSIS.to_string(),
    };
    let suggestions = match fields.get("suggestions") {
        Some(Value::Array(items)) if items.is_empty() => match policy {
            EmptySuggestions::Preserve => Vec::new(),
            EmptySuggestions::Sentinel => vec![NO_SUGGESTIONS.to_string()],
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => vec![NO_SUGGESTIONS.to_string()],
    };

    EvaluationResult::new(match_score, analysis, suggestions)
}

/// The result returned when the model output cannot be understood
pub fn fallback() -> EvaluationResult {
    EvaluationResult::new(
        0.0,
        FALLBACK_ANALYSIS.to_string(),
        FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    )
}

/// First `{` through last `}`
fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn score(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
