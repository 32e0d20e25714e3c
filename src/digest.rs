//! # Structural Digest Module
//!
//! Reduces raw HTML to a bounded JSON summary that is small enough to put in
//! a prompt. The model only ever sees this digest, never the page itself.
//!
//! The digest carries the title and meta description, heading counts with a
//! few samples, form/image/link counts, a sample of CSS class tokens, and a
//! truncated skeleton of the body with scripts, styles and comments removed.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Returned instead of a digest when serialization fails
pub const DIGEST_FAILURE: &str = "Failed to extract key information from HTML";

/// Maximum number of characters kept from the structural skeleton
pub const MAX_STRUCTURE_CHARS: usize = 5000;

/// Maximum number of class tokens sampled
pub const MAX_CLASSES: usize = 20;

const MAX_HEADING_SAMPLES: usize = 3;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("valid pattern ", stringify!($name))));
    };
}

pattern!(TITLE, r"(?is)<title[^>]*>(.*?)</title>");
pattern!(DESCRIPTION, r#"(?i)<meta name="description" content="(.*?)""#);
pattern!(H1, r"(?is)<h1[^>]*>(.*?)</h1>");
pattern!(H2, r"(?is)<h2[^>]*>(.*?)</h2>");
pattern!(BODY, r"(?is)<body[^>]*>(.*)</body>");
pattern!(FORM, r"(?i)<form");
pattern!(IMG, r"(?i)<img");
pattern!(LINK, r"(?i)<a\s");
pattern!(CLASS_ATTR, r#"(?i)class="([^"]*)""#);
pattern!(SCRIPT, r"(?is)<script\b.*?</script>");
pattern!(STYLE, r"(?is)<style\b.*?</style>");
pattern!(COMMENT, r"(?s)<!--.*?-->");
pattern!(INTER_TAG_SPACE, r">\s+<");
pattern!(TAG, r"<[^>]+>");

/// Structured summary of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDigest {
    /// Contents of the first `<title>`
    pub title: String,

    /// Meta description
    pub description: String,

    /// Heading counts and samples
    pub headings: Headings,

    /// Element counts inside the body
    pub elements: ElementCounts,

    /// Styling hints
    pub styling: Styling,

    /// Body skeleton without scripts, styles or comments
    pub structure: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: usize,
    pub h2: usize,
    /// Up to three h1 samples followed by up to three h2 samples
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCounts {
    pub forms: usize,
    pub images: usize,
    pub links: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Styling {
    pub unique_classes: Vec<String>,
}

impl PageDigest {
    /// Build a digest from raw HTML
    pub fn from_html(html: &str) -> Self {
        let title = first_capture(&TITLE, html).unwrap_or_else(|| "No title found".to_string());
        let description =
            first_capture(&DESCRIPTION, html).unwrap_or_else(|| "No description found".to_string());

        let h1s = heading_texts(&H1, html);
        let h2s = heading_texts(&H2, html);
        let samples = h1s
            .iter()
            .take(MAX_HEADING_SAMPLES)
            .chain(h2s.iter().take(MAX_HEADING_SAMPLES))
            .cloned()
            .collect();

        let body = BODY
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(html);

        Self {
            title,
            description,
            headings: Headings {
                h1: h1s.len(),
                h2: h2s.len(),
                samples,
            },
            elements: ElementCounts {
                forms: FORM.find_iter(body).count(),
                images: IMG.find_iter(body).count(),
                links: LINK.find_iter(body).count(),
            },
            styling: Styling {
                unique_classes: unique_classes(body),
            },
            structure: skeleton(body),
        }
    }
}

/// Produce the JSON digest of `html`
///
/// Never fails: if the digest cannot be serialized the [`DIGEST_FAILURE`]
/// sentinel is returned so the pipeline keeps going.
pub fn digest(html: &str) -> String {
    let summary = PageDigest::from_html(html);
    debug!(
        title = %summary.title,
        classes = summary.styling.unique_classes.len(),
        structure_chars = summary.structure.chars().count(),
        "Built page digest"
    );

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => json,
        Err(e) => {
            error!("Error extracting key info from HTML: {}", e);
            DIGEST_FAILURE.to_string()
        }
    }
}

fn first_capture(pattern: &Regex, html: &str) -> Option<String> {
    pattern
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn heading_texts(pattern: &Regex, html: &str) -> Vec<String> {
    pattern
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| TAG.replace_all(m.as_str(), "").trim().to_string())
        .collect()
}

fn unique_classes(body: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    let tokens = CLASS_ATTR
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .flat_map(|m| m.as_str().split_whitespace());

    for token in tokens {
        if classes.len() == MAX_CLASSES {
            break;
        }
        if !classes.iter().any(|c| c == token) {
            classes.push(token.to_string());
        }
    }
    classes
}

fn skeleton(body: &str) -> String {
    let stripped = SCRIPT.replace_all(body, "");
    let stripped = STYLE.replace_all(&stripped, "");
    let stripped = COMMENT.replace_all(&stripped, "");
    let collapsed = INTER_TAG_SPACE.replace_all(&stripped, "><");
    collapsed.chars().take(MAX_STRUCTURE_CHARS).collect()
}
