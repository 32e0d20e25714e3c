//! # Auto-Evaluation Controller
//!
//! The stateful loop that decides when to evaluate, interprets scores, and
//! relays outcomes to the chat collaborator.
//!
//! ## Key Components
//!
//! - `Controller`: Owns mode, running flag, history and the auto timer
//! - `ValuationBackend`: Where requests go (in-process `Evaluator` or `HttpValuationClient`)
//! - `EnvironmentContext` / `ChatSessionHandle`: The page and chat it reports to
//!
//! The controller is driven by a single `tokio::select!` loop over incoming
//! commands, the auto timer and completed runs. All state changes happen on
//! that loop, so nothing here needs a lock.

mod backend;
mod config;
mod context;
mod events;

use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::acquirer::is_preview_target;
use crate::evaluation::{
    EvaluationResult, ValuationHistoryItem, ValuationRequest, ValuationResult,
};

pub use backend::{BackendError, HttpValuationClient, ValuationBackend};
pub use config::{
    ControllerConfig, ControllerConfigBuilder, DEFAULT_PERIOD, DEFAULT_THRESHOLD, TickPolicy,
};
pub use context::{ChatSessionHandle, EnvironmentContext};
pub use events::{
    ControllerCommand, MessageKind, Mode, Notice, NoticeLevel, OutboundMessage, format_score,
    outcome_messages,
};

type Run = BoxFuture<'static, Result<ValuationResult, BackendError>>;

/// Point-in-time view of controller state for observers
#[derive(Debug, Clone, Default)]
pub struct ControllerSnapshot {
    pub url: String,
    pub mode: Mode,
    pub running: bool,
    pub history: Vec<ValuationHistoryItem>,
    pub current_result: Option<ValuationResult>,
    pub error: Option<String>,
    pub in_flight: usize,
}

/// Drives evaluations for one target and requirement
pub struct Controller<B, E, S> {
    backend: Arc<B>,
    context: E,
    chat: S,
    config: ControllerConfig,
    url: String,
    requirements: String,
    mode: Mode,
    running: bool,
    history: Vec<ValuationHistoryItem>,
    current_result: Option<ValuationResult>,
    error: Option<String>,
    auto_started: bool,
    timer: Option<Interval>,
    in_flight: FuturesUnordered<Run>,
    snapshots: watch::Sender<ControllerSnapshot>,
}

impl<B, E, S> Controller<B, E, S>
where
    B: ValuationBackend,
    E: EnvironmentContext,
    S: ChatSessionHandle,
{
    pub fn new(backend: B, context: E, chat: S, config: ControllerConfig) -> Self {
        let (snapshots, _) = watch::channel(ControllerSnapshot::default());
        Self {
            backend: Arc::new(backend),
            context,
            chat,
            config,
            url: String::new(),
            requirements: String::new(),
            mode: Mode::Manual,
            running: false,
            history: Vec::new(),
            current_result: None,
            error: None,
            auto_started: false,
            timer: None,
            in_flight: FuturesUnordered::new(),
            snapshots,
        }
    }

    /// Set the initial target and requirement
    pub fn with_target(mut self, url: impl Into<String>, requirements: impl Into<String>) -> Self {
        self.url = url.into();
        self.requirements = requirements.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn history(&self) -> &[ValuationHistoryItem] {
        &self.history
    }

    pub fn current_result(&self) -> Option<&ValuationResult> {
        self.current_result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Watch state changes made by the loop
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.subscribe()
    }

    /// Run until `Shutdown` arrives or every sender is dropped
    ///
    /// Runs still in flight at shutdown are dropped.
    #[instrument(name = "controller", skip_all, fields(url = %self.url))]
    pub async fn run(&mut self, mut commands: mpsc::Receiver<ControllerCommand>) {
        self.adopt_preview_address();
        self.maybe_auto_start();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(ControllerCommand::Shutdown) | None => break,
                        Some(command) => self.handle(command),
                    }
                }
                _ = next_tick(&mut self.timer), if self.timer.is_some() => self.on_tick(),
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete(outcome)
                }
            }
            self.publish();
        }

        self.timer = None;
        if !self.in_flight.is_empty() {
            warn!("Dropping {} in-flight evaluation(s)", self.in_flight.len());
        }
        info!("Controller stopped");
    }

    fn handle(&mut self, command: ControllerCommand) {
        debug!(?command, "Handling command");
        match command {
            ControllerCommand::StartAuto => self.start_auto_mode(),
            ControllerCommand::StopAuto => self.stop_auto_mode(),
            ControllerCommand::SetMode(mode) => self.set_mode(mode),
            ControllerCommand::RunManual => self.run_manual(),
            ControllerCommand::SetUrl(url) => self.set_url(url),
            ControllerCommand::SetRequirements(requirements) => {
                self.set_requirements(requirements)
            }
            ControllerCommand::SelectHistory(index) => {
                if !self.select_history(index) {
                    warn!("No history entry at index {}", index);
                }
            }
            ControllerCommand::Resend => self.resend(),
            ControllerCommand::Shutdown => {}
        }
    }

    pub fn start_auto_mode(&mut self) {
        self.transition(Mode::Auto, true);
    }

    /// Prevent further ticks; a run already in flight still completes
    pub fn stop_auto_mode(&mut self) {
        self.transition(self.mode, false);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.transition(mode, self.running);
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url != self.url {
            info!(%url, "Target changed");
            self.url = url;
            self.sync_timer();
        }
        self.maybe_auto_start();
    }

    pub fn set_requirements(&mut self, requirements: impl Into<String>) {
        self.requirements = requirements.into();
        self.maybe_auto_start();
    }

    /// Evaluate once now, regardless of mode
    pub fn run_manual(&mut self) {
        self.adopt_preview_address();
        self.dispatch();
    }

    /// Make a history entry the current result
    pub fn select_history(&mut self, index: usize) -> bool {
        match self.history.get(index) {
            Some(item) => {
                self.current_result = Some(item.result.clone());
                true
            }
            None => false,
        }
    }

    /// Relay the current result to chat again
    pub fn resend(&mut self) {
        match self.current_result.clone() {
            Some(result) => self.relay(&result.evaluation),
            None => self
                .context
                .notify(Notice::error("Failed to send suggestions to chat")),
        }
    }

    /// Wait for every in-flight run and apply its outcome
    pub async fn settle(&mut self) {
        while let Some(outcome) = self.in_flight.next().await {
            self.complete(outcome);
        }
        self.publish();
    }

    fn auto_active(&self) -> bool {
        self.mode == Mode::Auto && self.running
    }

    fn transition(&mut self, mode: Mode, running: bool) {
        if self.mode == mode && self.running == running {
            return;
        }
        debug!(?mode, running, "Controller state change");
        self.mode = mode;
        self.running = running;
        self.sync_timer();
    }

    /// Tear down the timer and arm a fresh one if auto mode is active
    fn sync_timer(&mut self) {
        self.timer = if self.auto_active() {
            let mut interval = time::interval(self.config.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(interval)
        } else {
            None
        };
    }

    fn maybe_auto_start(&mut self) {
        if !self.config.auto_start || self.auto_started || self.current_result.is_some() {
            return;
        }
        if self.url.is_empty() || self.requirements.trim().is_empty() {
            return;
        }
        info!(url = %self.url, "Auto-starting evaluation");
        self.auto_started = true;
        self.start_auto_mode();
    }

    /// Follow the page to a preview address; true when the target changed
    fn adopt_preview_address(&mut self) -> bool {
        match self.context.current_address() {
            Some(address) if address != self.url && is_preview_target(&address) => {
                info!(%address, "Detected preview URL");
                self.set_url(address);
                true
            }
            _ => false,
        }
    }

    fn on_tick(&mut self) {
        if !self.auto_active() {
            self.timer = None;
            return;
        }
        if self.adopt_preview_address() {
            // the re-armed timer fires immediately for the new target
            return;
        }
        if self.config.tick_policy == TickPolicy::Serialize && !self.in_flight.is_empty() {
            debug!("Skipping tick while an evaluation is in flight");
            return;
        }
        self.dispatch();
    }

    fn dispatch(&mut self) {
        if self.url.is_empty() || self.requirements.trim().is_empty() {
            warn!("Evaluation requested without url or requirements");
            self.error = Some("URL and requirements are required".to_string());
            return;
        }

        self.error = None;
        self.context
            .notify(Notice::info("Waiting for preview to be fully generated..."));

        let request = ValuationRequest::new(&self.url, &self.requirements)
            .with_selector(&self.config.selector);
        let backend = Arc::clone(&self.backend);
        info!(url = %self.url, in_flight = self.in_flight.len(), "Dispatching evaluation");
        self.in_flight
            .push(Box::pin(async move { backend.evaluate(request).await }));
    }

    fn complete(&mut self, outcome: Result<ValuationResult, BackendError>) {
        match outcome {
            Ok(result) => {
                let score = result.score();
                info!(score, "Evaluation completed");
                self.current_result = Some(result.clone());
                self.relay(&result.evaluation);
                if score >= self.config.threshold {
                    self.transition(self.mode, false);
                }
                self.history.push(ValuationHistoryItem::now(result));
            }
            Err(e) => {
                error!("Evaluation run failed: {}", e);
                let message = e.to_string();
                self.context.notify(Notice::error(message.clone()));
                self.error = Some(message);
            }
        }
    }

    fn relay(&self, evaluation: &EvaluationResult) {
        self.chat.mark_started();
        self.chat.show_chat();

        for message in outcome_messages(evaluation, self.config.threshold) {
            self.context.broadcast(message);
        }

        let score = format_score(evaluation.match_score);
        let notice = if evaluation.match_score >= self.config.threshold {
            Notice::success(format!("Requirements matched with score: {score}%"))
        } else {
            Notice::info(format!("Improvement suggestions added (match: {score}%)"))
        };
        self.context.notify(notice);
    }

    fn publish(&self) {
        self.snapshots.send_replace(ControllerSnapshot {
            url: self.url.clone(),
            mode: self.mode,
            running: self.running,
            history: self.history.clone(),
            current_result: self.current_result.clone(),
            error: self.error.clone(),
            in_flight: self.in_flight.len(),
        });
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
