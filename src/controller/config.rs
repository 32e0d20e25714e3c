//! Configuration for the auto-evaluation controller

use std::time::Duration;

use crate::evaluation::DEFAULT_SELECTOR;

/// Score at or above which requirements count as met
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Delay between auto-mode runs
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

/// What happens when the auto timer fires while a run is still in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickPolicy {
    /// Skip the tick
    #[default]
    Serialize,
    /// Start another run alongside the pending one
    Overlap,
}

/// Configuration parameters for a [`crate::controller::Controller`]
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Success threshold on the 0..=100 score scale
    pub threshold: f64,

    /// Auto-mode period
    pub period: Duration,

    pub tick_policy: TickPolicy,

    /// Enter auto mode once target and requirements are known
    pub auto_start: bool,

    /// Selector sent with every request
    pub selector: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            period: DEFAULT_PERIOD,
            tick_policy: TickPolicy::default(),
            auto_start: false,
            selector: DEFAULT_SELECTOR.to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }
}

/// Builder for `ControllerConfig`
#[derive(Debug, Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn tick_policy(mut self, tick_policy: TickPolicy) -> Self {
        self.config.tick_policy = tick_policy;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.config.auto_start = auto_start;
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.config.selector = selector.into();
        self
    }

    pub fn build(self) -> ControllerConfig {
        self.config
    }
}
