//! Content extraction functionality for the acquirer module

use std::sync::LazyLock;

use regex::RegexBuilder;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

static SRCDOC_FRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[srcdoc]").expect("valid srcdoc selector"));
static SRC_FRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src]").expect("valid src selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

/// Regions tried in order when no frame yields content, most specific first.
static REGION_CASCADE: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    [
        ("preview class", r#"[class*="preview"]"#),
        ("tab panel", r#"[role="tabpanel"]"#),
        ("inline frame", "iframe"),
        ("code block", "code"),
        ("main region", "main"),
    ]
    .into_iter()
    .map(|(name, css)| (name, Selector::parse(css).expect("valid region selector")))
    .collect()
});

/// Whether a URL points at a loopback or preview host
///
/// Falls back to substring matching when the URL has no host, so a bare
/// `localhost:3000` (which parses with `localhost` as its scheme) still counts.
pub fn is_preview_target(url: &str) -> bool {
    let parsed = Url::parse(url).ok();
    match parsed.as_ref().and_then(|parsed| parsed.host_str()) {
        Some(host) => {
            matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1" | "0.0.0.0")
                || host.contains("preview")
        }
        None => url.contains("localhost") || url.contains("127.0.0.1") || url.contains("preview"),
    }
}

/// Return the entity-decoded `srcdoc` payload of the first frame that has one
///
/// Blank payloads are ignored so a placeholder frame does not shadow a real `src`.
pub fn find_srcdoc(document: &Html) -> Option<String> {
    document
        .select(&SRCDOC_FRAME)
        .filter_map(|frame| frame.value().attr("srcdoc"))
        .map(str::trim)
        .find(|payload| !payload.is_empty())
        .map(str::to_string)
}

/// Return the raw `src` of the first frame that has one
pub fn find_frame_src(document: &Html) -> Option<String> {
    document
        .select(&SRC_FRAME)
        .filter_map(|frame| frame.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

/// Resolve a frame `src` against the page it was found on
///
/// Handles absolute, protocol-relative (`//host/path`) and relative forms.
pub fn resolve_frame_url(page_url: &str, src: &str) -> Result<Url, url::ParseError> {
    let base = Url::parse(page_url)?;
    base.join(src)
}

/// Pick the most specific region of a page that carries enough content
///
/// Candidates are tried in cascade order; the first one whose trimmed inner
/// markup is longer than `min_len` characters wins. When nothing qualifies
/// the whole `body` is returned, or the raw page if it has no `body` tag.
pub fn select_region(raw: &str, document: &Html, min_len: usize) -> String {
    for (name, selector) in REGION_CASCADE.iter() {
        if let Some(element) = document.select(selector).next() {
            let content = inner_content(element);
            if content.chars().count() > min_len {
                debug!("Selected {} region ({} chars)", name, content.len());
                return content;
            }
        }
    }

    if has_body_tag(raw) {
        if let Some(body) = document.select(&BODY).next() {
            debug!("Falling back to body region");
            return inner_content(body);
        }
    }

    debug!("No region matched, returning raw page");
    raw.to_string()
}

/// Extract the inner content of the first `<tag ...>...</tag>` occurrence
///
/// Used for external targets where the caller names a tag. The match is a
/// single case-insensitive, non-greedy pattern and does not balance nesting.
pub fn extract_tag(html: &str, tag: &str) -> Option<String> {
    let tag = regex::escape(tag.trim());
    if tag.is_empty() {
        return None;
    }
    let pattern = format!(r"<{tag}[^>]*>([\s\S]*?)</{tag}>");
    let regex = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(regex) => regex,
        Err(e) => {
            warn!("Failed to build pattern for tag '{}': {}", tag, e);
            return None;
        }
    };

    regex
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim().to_string())
        .filter(|inner| !inner.is_empty())
}

fn inner_content(element: ElementRef<'_>) -> String {
    element.inner_html().trim().to_string()
}

fn has_body_tag(raw: &str) -> bool {
    raw.to_ascii_lowercase().contains("<body")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(len: usize) -> String {
        "a".repeat(len)
    }

    #[test]
    fn test_is_preview_target() {
        assert!(is_preview_target("http://localhost:3000"));
        assert!(is_preview_target("http://127.0.0.1:5173/index.html"));
        assert!(is_preview_target("https://abc.preview.example.dev/"));
        assert!(is_preview_target("localhost:3000"));
        assert!(!is_preview_target("https://example.com/page"));
    }

    #[test]
    fn test_hostless_loopback_address_is_preview() {
        assert!(is_preview_target("localhost:5173/app"));
        assert!(is_preview_target("127.0.0.1:8080"));
        assert!(!is_preview_target("mailto:someone@example.com"));
    }

    #[test]
    fn test_srcdoc_is_entity_decoded() {
        let html = r#"<html><body><div class="preview">ignored</div>
            <iframe srcdoc="&lt;h1 class=&quot;title&quot;&gt;Hi &amp; bye&lt;/h1&gt;&#39;"></iframe>
            </body></html>"#;
        let document = Html::parse_document(html);

        assert_eq!(
            find_srcdoc(&document).as_deref(),
            Some(r#"<h1 class="title">Hi & bye</h1>'"#)
        );
    }

    #[test]
    fn test_blank_srcdoc_is_skipped() {
        let document = Html::parse_document(r#"<iframe srcdoc="   " src="/frame"></iframe>"#);

        assert!(find_srcdoc(&document).is_none());
        assert_eq!(find_frame_src(&document).as_deref(), Some("/frame"));
    }

    #[test]
    fn test_resolve_frame_url_forms() {
        let page = "http://localhost:3000/app/index.html";

        assert_eq!(
            resolve_frame_url(page, "frame.html").unwrap().as_str(),
            "http://localhost:3000/app/frame.html"
        );
        assert_eq!(
            resolve_frame_url(page, "/preview/1").unwrap().as_str(),
            "http://localhost:3000/preview/1"
        );
        assert_eq!(
            resolve_frame_url(page, "//cdn.example.com/p").unwrap().as_str(),
            "http://cdn.example.com/p"
        );
        assert_eq!(
            resolve_frame_url(page, "https://other.test/x").unwrap().as_str(),
            "https://other.test/x"
        );
    }

    #[test]
    fn test_cascade_prefers_preview_class() {
        let preview = filler(142);
        let html = format!(
            r#"<html><body><main>{}</main><div class="app-preview">  {}  </div></body></html>"#,
            filler(300),
            preview
        );
        let document = Html::parse_document(&html);

        assert_eq!(select_region(&html, &document, 100), preview);
    }

    #[test]
    fn test_cascade_skips_short_candidates() {
        let html = format!(
            r#"<html><body><div class="preview">short</div><div role="tabpanel">{}</div></body></html>"#,
            filler(150)
        );
        let document = Html::parse_document(&html);

        assert_eq!(select_region(&html, &document, 100), filler(150));
    }

    #[test]
    fn test_cascade_falls_back_to_body() {
        let html = "<html><body><p>tiny</p></body></html>";
        let document = Html::parse_document(html);

        assert_eq!(select_region(html, &document, 100), "<p>tiny</p>");
    }

    #[test]
    fn test_cascade_returns_raw_without_body() {
        let raw = "plain text response";
        let document = Html::parse_document(raw);

        assert_eq!(select_region(raw, &document, 100), raw);
    }

    #[test]
    fn test_extract_tag() {
        let html = "<html><PREVIEW data-x=1>\n  inner <b>bits</b>\n</preview><preview>second</preview></html>";

        assert_eq!(extract_tag(html, "preview").as_deref(), Some("inner <b>bits</b>"));
        assert!(extract_tag(html, "section").is_none());
        assert!(extract_tag(html, "").is_none());
    }
}
