//! HTTP acquisition with preview-aware retry

use reqwest::header::USER_AGENT;
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::acquirer::config::AcquirerConfig;
use crate::acquirer::error::AcquisitionError;
use crate::acquirer::extraction::{
    extract_tag, find_frame_src, find_srcdoc, is_preview_target, resolve_frame_url,
    select_region,
};

/// Fetches representative content for a target URL
///
/// Preview targets are polled until their rendered output looks ready,
/// because the build behind them finishes asynchronously. External targets
/// are fetched once.
#[derive(Debug, Clone)]
pub struct Acquirer {
    client: reqwest::Client,
    config: AcquirerConfig,
}

impl Default for Acquirer {
    fn default() -> Self {
        Self::new(AcquirerConfig::default())
    }
}

impl Acquirer {
    /// Create an acquirer with its own HTTP client
    pub fn new(config: AcquirerConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create an acquirer sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: AcquirerConfig) -> Self {
        Self { client, config }
    }

    /// Get the configuration
    pub fn config(&self) -> &AcquirerConfig {
        &self.config
    }

    /// Acquire content for `url`
    ///
    /// `selector` is a tag name and is only honoured for external targets.
    #[instrument(skip(self))]
    pub async fn acquire(
        &self,
        url: &str,
        selector: Option<&str>,
    ) -> Result<String, AcquisitionError> {
        if is_preview_target(url) {
            self.acquire_preview(url).await
        } else {
            self.acquire_external(url, selector).await
        }
    }

    async fn acquire_preview(&self, url: &str) -> Result<String, AcquisitionError> {
        let mut last_error = None;
        let schedule = self.config.backoff_schedule();
        let attempts = schedule.len() as u32;

        for (attempt, delay) in schedule.into_iter().enumerate() {
            let remaining = attempts - attempt as u32;
            match self.fetch_preview_once(url).await {
                Ok(content) if self.config.qualifies(&content) => {
                    info!("Acquired {} chars of preview content", content.len());
                    return Ok(content);
                }
                Ok(_) => {
                    info!(
                        "Preview content not ready yet, retrying... ({} attempts left)",
                        remaining
                    );
                }
                Err(e) => {
                    warn!("Error fetching preview ({} attempts left): {}", remaining, e);
                    last_error = Some(e);
                }
            }

            debug!("Backing off for {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        Err(last_error.unwrap_or(AcquisitionError::Exhausted { attempts }))
    }

    /// One pass over the preview page: srcdoc frame, then src frame, then region cascade
    async fn fetch_preview_once(&self, url: &str) -> Result<String, AcquisitionError> {
        let html = self.get_text(url, true).await?;

        let (srcdoc, frame_src) = {
            let document = Html::parse_document(&html);
            (find_srcdoc(&document), find_frame_src(&document))
        };

        if let Some(payload) = srcdoc {
            debug!("Using iframe srcdoc content");
            return Ok(payload);
        }

        if let Some(src) = frame_src {
            match resolve_frame_url(url, &src) {
                Ok(frame_url) => {
                    if let Some(content) = self.fetch_frame(frame_url).await {
                        return Ok(content);
                    }
                }
                Err(e) => warn!("Skipping iframe with unresolvable src '{}': {}", src, e),
            }
        }

        let document = Html::parse_document(&html);
        Ok(select_region(&html, &document, self.config.min_content_len))
    }

    /// Fetch an iframe document; failures fall through to the region cascade
    async fn fetch_frame(&self, frame_url: Url) -> Option<String> {
        debug!("Fetching iframe content from {}", frame_url);
        match self.get_text(frame_url.as_str(), true).await {
            Ok(body) if !body.trim().is_empty() => Some(body.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to fetch iframe content from {}: {}", frame_url, e);
                None
            }
        }
    }

    async fn acquire_external(
        &self,
        url: &str,
        selector: Option<&str>,
    ) -> Result<String, AcquisitionError> {
        let html = self.get_text(url, false).await?;

        if let Some(tag) = selector {
            if let Some(inner) = extract_tag(&html, tag) {
                debug!("Extracted <{}> content from {}", tag, url);
                return Ok(inner);
            }
        }

        Ok(html)
    }

    async fn get_text(&self, url: &str, identify: bool) -> Result<String, AcquisitionError> {
        let mut request = self.client.get(url);
        if identify {
            request = request.header(USER_AGENT, &self.config.user_agent);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::from_status(status));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn fast_config() -> AcquirerConfig {
        AcquirerConfig::builder().initial_backoff_ms(1).build()
    }

    /// mockito listens on 127.0.0.1, so its URLs are treated as preview targets
    fn page(body: &str) -> String {
        format!("<html><head><title>t</title></head><body>{body}</body></html>")
    }

    #[tokio::test]
    async fn test_srcdoc_wins_over_preview_region() {
        let mut server = Server::new_async().await;
        let payload = format!("<h1>Centered</h1><p>{}</p>", "x".repeat(120));
        let escaped = payload.replace('<', "&lt;").replace('>', "&gt;");
        let body = page(&format!(
            r#"<div class="preview">{}</div><iframe srcdoc="{}"></iframe>"#,
            "y".repeat(200),
            escaped
        ));
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", Matcher::Regex("ValuationAgent/1.0".into()))
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await;

        let acquirer = Acquirer::new(fast_config());
        let content = acquirer.acquire(&server.url(), None).await.unwrap();

        assert_eq!(content, payload);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_preview_class_region_is_selected() {
        let mut server = Server::new_async().await;
        let region = "c".repeat(142);
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(page(&format!(r#"<div class="app-preview">{region}</div>"#)))
            .create_async()
            .await;

        let acquirer = Acquirer::new(fast_config());
        let content = acquirer.acquire(&server.url(), None).await.unwrap();

        assert_eq!(content, region);
    }

    #[tokio::test]
    async fn test_iframe_src_is_followed() {
        let mut server = Server::new_async().await;
        let frame_body = format!("<html><body><button>{}</button></body></html>", "z".repeat(150));
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(page(r#"<iframe src="/frame/1"></iframe>"#))
            .create_async()
            .await;
        let frame = server
            .mock("GET", "/frame/1")
            .with_status(200)
            .with_body(&frame_body)
            .expect(1)
            .create_async()
            .await;

        let acquirer = Acquirer::new(fast_config());
        let content = acquirer.acquire(&server.url(), None).await.unwrap();

        assert_eq!(content, frame_body);
        frame.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_iframe_falls_through_to_cascade() {
        let mut server = Server::new_async().await;
        let main = "m".repeat(130);
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(page(&format!(
                r#"<iframe src="/missing"></iframe><main>{main}</main>"#
            )))
            .create_async()
            .await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let acquirer = Acquirer::new(fast_config());
        let content = acquirer.acquire(&server.url(), None).await.unwrap();

        assert_eq!(content, main);
    }

    #[tokio::test]
    async fn test_short_content_exhausts_all_attempts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(page("<p>Loading preview...</p>"))
            .expect(5)
            .create_async()
            .await;

        let acquirer = Acquirer::new(fast_config());
        let result = acquirer.acquire(&server.url(), None).await;

        assert!(matches!(result, Err(AcquisitionError::Exhausted { attempts: 5 })));
        mock.assert_async().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_backoff_sleeps_between_attempts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(page("<p>Loading preview...</p>"))
            .expect(5)
            .create_async()
            .await;
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();
        let acquirer = Acquirer::with_client(client, AcquirerConfig::default());

        let started = tokio::time::Instant::now();
        let result = acquirer.acquire(&server.url(), None).await;
        let elapsed = started.elapsed();

        // 1000 + 1500 + 2250 + 3375 + 5062 ms
        assert!(matches!(result, Err(AcquisitionError::Exhausted { attempts: 5 })));
        assert!(elapsed >= Duration::from_millis(13_187), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(20), "elapsed {elapsed:?}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_last_error_is_propagated() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(503)
            .expect(5)
            .create_async()
            .await;

        let acquirer = Acquirer::new(fast_config());
        let result = acquirer.acquire(&server.url(), None).await;

        assert!(matches!(
            result,
            Err(AcquisitionError::Status { status: 503, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_external_target_is_fetched_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><section>hello</section></html>")
            .expect(1)
            .create_async()
            .await;
        // Reach the same server through a non-loopback name
        let url = server.url().replace("127.0.0.1", "external.test");
        let acquirer = Acquirer::with_client(
            reqwest::Client::builder()
                .resolve("external.test", server.socket_address())
                .build()
                .unwrap(),
            fast_config(),
        );

        let content = acquirer
            .acquire(&format!("{url}/page"), Some("section"))
            .await
            .unwrap();

        assert_eq!(content, "hello");
        mock.assert_async().await;
    }
}
