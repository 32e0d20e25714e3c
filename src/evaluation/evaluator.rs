//! The evaluation call

use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::acquirer::Acquirer;
use crate::digest::digest;
use crate::evaluation::config::EvaluatorConfig;
use crate::evaluation::error::EvaluationError;
use crate::evaluation::parse::recover_evaluation;
use crate::evaluation::prompt::{dom_messages, screenshot_messages};
use crate::evaluation::{EvaluationResult, ValuationRequest, ValuationResult};
use crate::model::{ChatMessage, StreamingModel, TextStream};
use crate::screenshot::{ImageFormat, ScreenshotClient, to_data_url};

/// Evaluates pages against requirements with a streaming model
#[derive(Debug, Clone)]
pub struct Evaluator<M> {
    model: M,
    acquirer: Acquirer,
    capturer: Option<ScreenshotClient>,
    config: EvaluatorConfig,
}

impl<M> Evaluator<M>
where
    M: StreamingModel,
{
    pub fn new(model: M, acquirer: Acquirer, config: EvaluatorConfig) -> Self {
        Self {
            model,
            acquirer,
            capturer: None,
            config,
        }
    }

    /// Enable the screenshot variant
    pub fn with_capturer(mut self, capturer: ScreenshotClient) -> Self {
        self.capturer = Some(capturer);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Evaluate the page structure
    ///
    /// Uses `request.html` when given, otherwise acquires the page. Errors
    /// only when the content cannot be obtained or the model call cannot
    /// start.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn evaluate_dom(
        &self,
        request: &ValuationRequest,
    ) -> Result<ValuationResult, EvaluationError> {
        request.validate()?;

        let html = match request.html.as_deref().filter(|html| !html.is_empty()) {
            Some(html) => html.to_string(),
            None => {
                let selector = request
                    .selector
                    .as_deref()
                    .unwrap_or(self.config.default_selector.as_str());
                self.acquirer.acquire(&request.url, Some(selector)).await?
            }
        };

        let structure = digest(&html);
        let evaluation = self
            .complete(dom_messages(&request.initial_requirements, &structure))
            .await?;

        info!(score = evaluation.match_score, "DOM evaluation complete");
        Ok(ValuationResult::for_url(&request.url, evaluation))
    }

    /// Evaluate a screenshot of the page
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn evaluate_screenshot(
        &self,
        request: &ValuationRequest,
    ) -> Result<ValuationResult, EvaluationError> {
        request.validate()?;
        let capturer = self
            .capturer
            .as_ref()
            .ok_or(EvaluationError::CaptureUnavailable)?;

        let options = self.config.screenshot_options(&request.url);
        let image = capturer.capture(&options).await?;
        let format = options.format.unwrap_or(ImageFormat::Jpg);
        let data_url = to_data_url(&image, format.mime_type());

        let evaluation = self
            .complete(screenshot_messages(&request.initial_requirements, &data_url))
            .await?;

        info!(score = evaluation.match_score, "Screenshot evaluation complete");
        Ok(ValuationResult::for_screenshot(data_url, evaluation))
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<EvaluationResult, EvaluationError> {
        let stream = self.model.stream(messages).await?;
        let text = drain(stream).await;
        debug!(chars = text.len(), "Model response received");
        Ok(recover_evaluation(&text, self.config.empty_suggestions))
    }
}

/// Concatenate chunks until the stream ends or a chunk fails
async fn drain(mut stream: TextStream) -> String {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => text.push_str(&chunk),
            Err(e) => {
                warn!("Model stream interrupted after {} bytes: {}", text.len(), e);
                break;
            }
        }
    }
    text
}
