//! Prompt construction for evaluation calls

use crate::model::ChatMessage;

const RESPONSE_CONTRACT: &str = "Provide a match score from 0-100, where 100 is a perfect match.
Provide a detailed analysis of what matches and what doesn't.
Provide specific suggestions for improvements.
Format your response as a JSON object with the following structure:
{
  \"matchScore\": number,
  \"analysis\": string,
  \"suggestions\": string[]
}
Only respond with valid JSON. Do not include any other text.";

/// Messages for the DOM variant
pub fn dom_messages(requirements: &str, digest: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You are a website valuation agent that evaluates web pages against initial requirements.\n\
             Analyze the provided HTML structure and determine how well it matches the initial requirements.\n\
             {RESPONSE_CONTRACT}"
        )),
        ChatMessage::user(format!(
            "Initial Requirements: {requirements}\n\nWeb Page Structure: {digest}"
        )),
    ]
}

/// Messages for the screenshot variant
pub fn screenshot_messages(requirements: &str, data_url: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You are a website valuation agent that evaluates screenshots against initial requirements.\n\
             Analyze the provided screenshot and determine how well it matches the initial requirements.\n\
             {RESPONSE_CONTRACT}"
        )),
        ChatMessage::user(format!(
            "Initial Requirements: {requirements}\n\nScreenshot: {data_url}"
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn test_dom_messages() {
        let messages = dom_messages("a blue button", "{\"title\":\"x\"}");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Only respond with valid JSON"));
        assert!(messages[0].content.contains("HTML structure"));
        assert_eq!(
            messages[1].content,
            "Initial Requirements: a blue button\n\nWeb Page Structure: {\"title\":\"x\"}"
        );
    }

    #[test]
    fn test_screenshot_messages() {
        let messages = screenshot_messages("a form", "data:image/jpeg;base64,AA==");

        assert!(messages[0].content.contains("\"matchScore\": number"));
        assert_eq!(
            messages[1].content,
            "Initial Requirements: a form\n\nScreenshot: data:image/jpeg;base64,AA=="
        );
    }
}
