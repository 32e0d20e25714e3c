//! # Acquirer Configuration Module
//!
//! Configuration for the content acquirer: retry budget, backoff curve, and
//! the heuristics used to decide whether a preview has finished rendering.
//! It uses a builder pattern like the rest of the crate's configuration.

use std::time::Duration;

/// User agent sent with every acquisition request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ValuationAgent/1.0)";

/// Configuration for the content acquirer
#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    /// Maximum number of fetch attempts against a preview target
    pub max_attempts: u32,

    /// Delay after the first failed attempt, in milliseconds
    pub initial_backoff_ms: u64,

    /// Factor applied to the delay after every failed attempt
    pub backoff_multiplier: f64,

    /// Content must be strictly longer than this many characters to qualify
    pub min_content_len: usize,

    /// User agent to use for requests
    pub user_agent: String,

    /// Placeholder text that marks a preview as still loading
    pub loading_marker: String,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1000,
            backoff_multiplier: 1.5,
            min_content_len: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            loading_marker: "Loading preview".to_string(),
        }
    }
}

/// Builder for AcquirerConfig
#[derive(Debug, Default)]
pub struct AcquirerConfigBuilder {
    config: AcquirerConfig,
}

impl AcquirerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AcquirerConfig::default(),
        }
    }

    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Set the first backoff delay in milliseconds
    pub fn initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.config.initial_backoff_ms = initial_backoff_ms;
        self
    }

    /// Set the backoff multiplier
    pub fn backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.config.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Set the minimum qualifying content length
    pub fn min_content_len(mut self, min_content_len: usize) -> Self {
        self.config.min_content_len = min_content_len;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the loading placeholder marker
    pub fn loading_marker(mut self, loading_marker: impl Into<String>) -> Self {
        self.config.loading_marker = loading_marker.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> AcquirerConfig {
        self.config
    }
}

impl AcquirerConfig {
    /// Create a new builder
    pub fn builder() -> AcquirerConfigBuilder {
        AcquirerConfigBuilder::new()
    }

    /// Delays slept after each failed attempt, in order.
    ///
    /// The delay is truncated to whole milliseconds after every step, so the
    /// default curve is 1000, 1500, 2250, 3375, 5062.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut delay = self.initial_backoff_ms as f64;
        (0..self.max_attempts)
            .map(|_| {
                let current = Duration::from_millis(delay as u64);
                delay *= self.backoff_multiplier;
                current
            })
            .collect()
    }

    /// Whether extracted content is long enough and not a loading placeholder
    pub fn qualifies(&self, content: &str) -> bool {
        content.chars().count() > self.min_content_len && !content.contains(&self.loading_marker)
    }
}
