//! # Screenshot Capture Module
//!
//! Thin wrapper over an external screenshot service. Options are passed
//! through as query parameters; anything left unset is omitted so the
//! service's own defaults apply. There is no retry here.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::Error as CrateError;

/// Default capture endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.screenshotone.com/take";

/// Error type for screenshot capture
#[derive(Debug, Error)]
pub enum CaptureError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Screenshot API error: {status} {text}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Status text
        text: String,
    },

    /// No access key was configured
    #[error("Missing screenshot access key: {0}")]
    MissingKey(String),
}

impl From<CaptureError> for CrateError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Http(e) => CrateError::Http(e),
            CaptureError::MissingKey(var) => {
                CrateError::Config(format!("{var} environment variable must be set"))
            }
            _ => CrateError::Capture(err.to_string()),
        }
    }
}

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpg,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }

    /// MIME type used when inlining the image as a data URL
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg | ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Capture configuration; only `url` is required
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOptions {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_ads: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_cookie_banners: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_trackers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_page: Option<bool>,
    /// Seconds to wait before capturing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    /// Seconds before the service gives up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

impl ScreenshotOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Toggle ad, cookie banner and tracker blocking together
    pub fn block_all(mut self, block: bool) -> Self {
        self.block_ads = Some(block);
        self.block_cookie_banners = Some(block);
        self.block_trackers = Some(block);
        self
    }

    pub fn image_quality(mut self, quality: u8) -> Self {
        self.image_quality = Some(quality);
        self
    }

    pub fn full_page(mut self, full_page: bool) -> Self {
        self.full_page = Some(full_page);
        self
    }

    pub fn delay(mut self, seconds: u32) -> Self {
        self.delay = Some(seconds);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

/// Client for the screenshot service
#[derive(Clone)]
pub struct ScreenshotClient {
    client: reqwest::Client,
    endpoint: String,
    access_key: String,
}

impl std::fmt::Debug for ScreenshotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ScreenshotClient {
    /// Create a client for the default endpoint
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_key: access_key.into(),
        }
    }

    /// Read `SCREENSHOT_API_KEY` and the optional `VALUATION_SCREENSHOT_ENDPOINT`
    pub fn from_env() -> Result<Self, CaptureError> {
        let access_key = std::env::var("SCREENSHOT_API_KEY")
            .map_err(|_| CaptureError::MissingKey("SCREENSHOT_API_KEY".to_string()))?;
        let client = Self::new(access_key);
        Ok(match std::env::var("VALUATION_SCREENSHOT_ENDPOINT") {
            Ok(endpoint) => client.with_endpoint(endpoint),
            Err(_) => client,
        })
    }

    /// Point the client at a different endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Query parameters for a capture, in the order they are sent
    pub fn query(&self, options: &ScreenshotOptions) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("access_key", self.access_key.clone()),
            ("url", options.url.clone()),
        ];

        if let Some(format) = options.format {
            params.push(("format", format.as_str().to_string()));
        }
        if let Some(block) = options.block_ads {
            params.push(("block_ads", block.to_string()));
        }
        if let Some(block) = options.block_cookie_banners {
            params.push(("block_cookie_banners", block.to_string()));
        }
        if let Some(block) = options.block_trackers {
            params.push(("block_trackers", block.to_string()));
        }
        if let Some(quality) = options.image_quality {
            params.push(("image_quality", quality.to_string()));
        }
        if let Some(full_page) = options.full_page {
            params.push(("full_page", full_page.to_string()));
        }
        if let Some(delay) = options.delay {
            params.push(("delay", delay.to_string()));
        }
        if let Some(timeout) = options.timeout {
            params.push(("timeout", timeout.to_string()));
        }

        params.push(("response_type", "by_format".to_string()));
        params
    }

    /// Capture a screenshot and return the raw image bytes
    #[instrument(skip(self), fields(url = %options.url))]
    pub async fn capture(&self, options: &ScreenshotOptions) -> Result<Vec<u8>, CaptureError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(options))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Upstream {
                status: status.as_u16(),
                text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Captured {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Encode image bytes as a `data:` URL
pub fn to_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, B64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn keys(params: &[(&'static str, String)]) -> Vec<&'static str> {
        params.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_unset_options_are_omitted() {
        let client = ScreenshotClient::new("secret");
        let mut options = ScreenshotOptions::new("https://x.test").format(ImageFormat::Jpg);
        options.block_ads = Some(true);

        let params = client.query(&options);

        assert_eq!(
            keys(&params),
            vec!["access_key", "url", "format", "block_ads", "response_type"]
        );
        assert!(params.contains(&("format", "jpg".to_string())));
        assert!(params.contains(&("block_ads", "true".to_string())));
    }

    #[test]
    fn test_explicit_false_and_zero_are_sent() {
        let client = ScreenshotClient::new("secret");
        let options = ScreenshotOptions::new("https://x.test")
            .full_page(false)
            .delay(0);

        let params = client.query(&options);

        assert!(params.contains(&("full_page", "false".to_string())));
        assert!(params.contains(&("delay", "0".to_string())));
        assert!(!keys(&params).contains(&"timeout"));
    }

    #[test]
    fn test_options_json_skips_unset_fields() {
        let options = ScreenshotOptions::new("https://x.test").image_quality(80);
        let json = serde_json::to_value(&options).unwrap();

        assert_eq!(json, serde_json::json!({"url": "https://x.test", "imageQuality": 80}));
    }

    #[test]
    fn test_to_data_url() {
        assert_eq!(to_data_url(b"hello", "image/png"), "data:image/png;base64,aGVsbG8=");
        assert_eq!(ImageFormat::Jpg.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_capture_returns_bytes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/take")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("access_key".into(), "secret".into()),
                Matcher::UrlEncoded("url".into(), "https://x.test".into()),
                Matcher::UrlEncoded("response_type".into(), "by_format".into()),
            ]))
            .with_status(200)
            .with_body([0xFF_u8, 0xD8, 0xFF])
            .expect(1)
            .create_async()
            .await;

        let client =
            ScreenshotClient::new("secret").with_endpoint(format!("{}/take", server.url()));
        let bytes = client
            .capture(&ScreenshotOptions::new("https://x.test"))
            .await
            .unwrap();

        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_capture_surfaces_upstream_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/take")
            .match_query(Matcher::Any)
            .with_status(402)
            .create_async()
            .await;

        let client =
            ScreenshotClient::new("secret").with_endpoint(format!("{}/take", server.url()));
        let err = client
            .capture(&ScreenshotOptions::new("https://x.test"))
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::Upstream { status: 402, .. }));
        assert_eq!(err.to_string(), "Screenshot API error: 402 Payment Required");
    }
}
