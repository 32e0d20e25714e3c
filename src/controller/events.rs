//! Messages flowing into and out of the controller.

use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationResult;

/// Kind of an outbound message, as seen by the chat collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Markdown summary of a run that met the threshold.
    ValuationSuccess,
    /// Markdown summary with bulleted improvements.
    ValuationSuggestions,
    /// Follow-up instruction the chat collaborator should act on.
    TriggerChat,
}

/// A `{type, content}` message broadcast to the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

impl OutboundMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// The two messages relayed for a result: a summary, then a chat trigger.
pub fn outcome_messages(evaluation: &EvaluationResult, threshold: f64) -> [OutboundMessage; 2] {
    let score = format_score(evaluation.match_score);

    if evaluation.match_score >= threshold {
        [
            OutboundMessage::new(
                MessageKind::ValuationSuccess,
                format!(
                    "## ✅ Requirements Matched ({score}%)\n\n{}\n\n**The current implementation successfully meets the requirements.**",
                    evaluation.analysis
                ),
            ),
            OutboundMessage::new(
                MessageKind::TriggerChat,
                format!(
                    "The website now meets the requirements with a match score of {score}%. Can you explain what makes it successful?"
                ),
            ),
        ]
    } else {
        let bullets = evaluation
            .suggestions
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n");
        [
            OutboundMessage::new(
                MessageKind::ValuationSuggestions,
                format!(
                    "## 🔄 Requirements Partially Met ({score}%)\n\n{}\n\n### Suggested Improvements:\n{bullets}",
                    evaluation.analysis
                ),
            ),
            OutboundMessage::new(
                MessageKind::TriggerChat,
                format!(
                    "The website currently has a match score of {score}%. Can you help implement these improvements: {}?",
                    evaluation.suggestions.join(", ")
                ),
            ),
        ]
    }
}

/// Whole scores print without a fractional part.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score}")
    }
}

/// Instructions accepted by a running controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    StartAuto,
    StopAuto,
    SetMode(Mode),
    /// Run one evaluation now, regardless of mode.
    RunManual,
    SetUrl(String),
    SetRequirements(String),
    /// Show a history entry as the current result.
    SelectHistory(usize),
    /// Relay the current result to chat again without re-evaluating.
    Resend,
    Shutdown,
}

/// Evaluation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Short user-facing status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(score: f64, suggestions: &[&str]) -> EvaluationResult {
        EvaluationResult::new(
            score,
            "Layout is close.".to_string(),
            suggestions.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_success_messages() {
        let [summary, trigger] = outcome_messages(&evaluation(92.0, &[]), 80.0);

        assert_eq!(summary.kind, MessageKind::ValuationSuccess);
        assert_eq!(
            summary.content,
            "## ✅ Requirements Matched (92%)\n\nLayout is close.\n\n**The current implementation successfully meets the requirements.**"
        );
        assert_eq!(trigger.kind, MessageKind::TriggerChat);
        assert!(trigger.content.contains("match score of 92%"));
    }

    #[test]
    fn test_suggestion_messages() {
        let [summary, trigger] = outcome_messages(&evaluation(55.5, &["Add a footer", "Center the card"]), 80.0);

        assert_eq!(summary.kind, MessageKind::ValuationSuggestions);
        assert!(summary.content.starts_with("## 🔄 Requirements Partially Met (55.5%)"));
        assert!(summary.content.ends_with("### Suggested Improvements:\n- Add a footer\n- Center the card"));
        assert_eq!(
            trigger.content,
            "The website currently has a match score of 55.5%. Can you help implement these improvements: Add a footer, Center the card?"
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let [summary, _] = outcome_messages(&evaluation(80.0, &[]), 80.0);
        assert_eq!(summary.kind, MessageKind::ValuationSuccess);

        let [summary, _] = outcome_messages(&evaluation(79.0, &[]), 80.0);
        assert_eq!(summary.kind, MessageKind::ValuationSuggestions);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(OutboundMessage::new(MessageKind::TriggerChat, "hi")).unwrap();

        assert_eq!(json, serde_json::json!({"type": "TRIGGER_CHAT", "content": "hi"}));
    }
}
