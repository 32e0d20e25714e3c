//! Configuration for the evaluator

use crate::screenshot::{ImageFormat, ScreenshotOptions};

/// Selector used when a request does not name one
pub const DEFAULT_SELECTOR: &str = "preview";

/// What to do when the model returns an explicit empty suggestions list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptySuggestions {
    /// Keep `[]` as returned
    #[default]
    Preserve,
    /// Replace `[]` with `["No suggestions provided"]`
    Sentinel,
}

/// Configuration for [`crate::evaluation::Evaluator`]
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Empty suggestions policy
    pub empty_suggestions: EmptySuggestions,

    /// Selector passed to the acquirer when the request has none
    pub default_selector: String,

    /// Image format for the screenshot variant
    pub screenshot_format: ImageFormat,

    /// JPEG/WebP quality for the screenshot variant
    pub screenshot_quality: u8,

    /// Capture the full scrollable page
    pub screenshot_full_page: bool,

    /// Block ads, cookie banners and trackers while capturing
    pub screenshot_block_all: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            empty_suggestions: EmptySuggestions::default(),
            default_selector: DEFAULT_SELECTOR.to_string(),
            screenshot_format: ImageFormat::Jpg,
            screenshot_quality: 80,
            screenshot_full_page: false,
            screenshot_block_all: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn builder() -> EvaluatorConfigBuilder {
        EvaluatorConfigBuilder::default()
    }

    /// Capture options for `url` under this configuration
    pub fn screenshot_options(&self, url: &str) -> ScreenshotOptions {
        ScreenshotOptions::new(url)
            .format(self.screenshot_format)
            .block_all(self.screenshot_block_all)
            .image_quality(self.screenshot_quality)
            .full_page(self.screenshot_full_page)
    }
}

/// Builder for `EvaluatorConfig`
#[derive(Debug, Default)]
pub struct EvaluatorConfigBuilder {
    config: EvaluatorConfig,
}

impl EvaluatorConfigBuilder {
    pub fn empty_suggestions(mut self, policy: EmptySuggestions) -> Self {
        self.config.empty_suggestions = policy;
        self
    }

    pub fn default_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.default_selector = selector.into();
        self
    }

    pub fn screenshot_format(mut self, format: ImageFormat) -> Self {
        self.config.screenshot_format = format;
        self
    }

    pub fn screenshot_quality(mut self, quality: u8) -> Self {
        self.config.screenshot_quality = quality;
        self
    }

    pub fn screenshot_full_page(mut self, full_page: bool) -> Self {
        self.config.screenshot_full_page = full_page;
        self
    }

    pub fn screenshot_block_all(mut self, block: bool) -> Self {
        self.config.screenshot_block_all = block;
        self
    }

    pub fn build(self) -> EvaluatorConfig {
        self.config
    }
}
