//! Where the controller sends its evaluation requests

use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::Error as CrateError;
use crate::evaluation::{DEFAULT_SELECTOR, EvaluationError, Evaluator, ValuationRequest, ValuationResult};
use crate::model::StreamingModel;
use crate::server::ErrorBody;

/// Error type for evaluation backends
#[derive(Debug, Error)]
pub enum BackendError {
    /// In-process evaluation failed
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The valuation API could not be reached
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The valuation API answered with an error body
    #[error("{message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// The `error` field of the response
        message: String,
    },
}

impl From<BackendError> for CrateError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Evaluation(e) => e.into(),
            BackendError::Http(e) => CrateError::Http(e),
            BackendError::Rejected { .. } => CrateError::Backend(err.to_string()),
        }
    }
}

/// Something that can evaluate a request
pub trait ValuationBackend: Send + Sync + 'static {
    fn evaluate(
        &self,
        request: ValuationRequest,
    ) -> impl Future<Output = Result<ValuationResult, BackendError>> + Send;
}

impl<M> ValuationBackend for Evaluator<M>
where
    M: StreamingModel + 'static,
{
    async fn evaluate(&self, request: ValuationRequest) -> Result<ValuationResult, BackendError> {
        Ok(self.evaluate_dom(&request).await?)
    }
}

/// Calls a remote valuation API over HTTP
#[derive(Debug, Clone)]
pub struct HttpValuationClient {
    client: reqwest::Client,
    base_url: String,
    selector: String,
    screenshot: bool,
}

impl HttpValuationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            selector: DEFAULT_SELECTOR.to_string(),
            screenshot: false,
        }
    }

    /// Use the screenshot endpoint instead of the DOM one
    pub fn screenshot(mut self, screenshot: bool) -> Self {
        self.screenshot = screenshot;
        self
    }

    /// Selector applied when a request has none
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    fn endpoint(&self) -> String {
        if self.screenshot {
            format!("{}/api/valuation/screenshot", self.base_url)
        } else {
            format!("{}/api/valuation", self.base_url)
        }
    }
}

impl ValuationBackend for HttpValuationClient {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn evaluate(&self, mut request: ValuationRequest) -> Result<ValuationResult, BackendError> {
        if request.selector.is_none() {
            request.selector = Some(self.selector.clone());
        }

        let response = self.client.post(self.endpoint()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(rejected(status, response).await);
        }

        let result: ValuationResult = response.json().await?;
        debug!(score = result.score(), "Valuation API responded");
        Ok(result)
    }
}

async fn rejected(status: StatusCode, response: reqwest::Response) -> BackendError {
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "Failed to evaluate page".to_string(),
    };
    BackendError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquirer::Acquirer;
    use crate::evaluation::EvaluatorConfig;
    use crate::model::MockStreamingModel;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_http_client_posts_with_default_selector() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/valuation")
            .match_body(Matcher::PartialJson(json!({
                "url": "http://localhost:5173",
                "initialRequirements": "a card",
                "selector": "preview"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "url": "http://localhost:5173",
                    "evaluation": {"matchScore": 64, "analysis": "ok", "suggestions": ["more"]}
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = HttpValuationClient::new(format!("{}/", server.url()));
        let result = client
            .evaluate(ValuationRequest::new("http://localhost:5173", "a card"))
            .await
            .unwrap();

        assert_eq!(result.score(), 64.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_client_surfaces_error_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/valuation/screenshot")
            .with_status(500)
            .with_body(r#"{"error":"Screenshot API error: 402 Payment Required"}"#)
            .create_async()
            .await;

        let client = HttpValuationClient::new(server.url()).screenshot(true);
        let err = client
            .evaluate(ValuationRequest::new("https://x.test", "reqs"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Rejected { status: 500, .. }));
        assert_eq!(err.to_string(), "Screenshot API error: 402 Payment Required");
    }

    #[tokio::test]
    async fn test_evaluator_backend() {
        let model = MockStreamingModel::with_text(r#"{"matchScore": 30}"#, 4).await;
        let evaluator = Evaluator::new(model, Acquirer::default(), EvaluatorConfig::default());

        let result = ValuationBackend::evaluate(
            &evaluator,
            ValuationRequest::new("http://x.test", "reqs").with_html("<p>hi</p>"),
        )
        .await
        .unwrap();

        assert_eq!(result.score(), 30.0);
    }
}
