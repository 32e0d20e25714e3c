//! HTTP API for evaluations.
//!
//! Exposes `POST /api/valuation` (DOM variant) and
//! `POST /api/valuation/screenshot` on top of an [`Evaluator`]. Failures come
//! back as `{"error": "..."}` with 400 for bad input and 500 otherwise.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::evaluation::{EvaluationError, Evaluator, ValuationRequest};
use crate::model::StreamingModel;

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Shared state for handlers.
struct AppState<M> {
    evaluator: Evaluator<M>,
}

impl IntoResponse for EvaluationError {
    fn into_response(self) -> Response {
        let status = match self {
            EvaluationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Error in valuation API: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Build the API router.
pub fn router<M>(evaluator: Evaluator<M>) -> Router
where
    M: StreamingModel + 'static,
{
    let state = Arc::new(AppState { evaluator });

    Router::new()
        .route("/api/valuation", post(dom_handler::<M>))
        .route("/api/valuation/screenshot", post(screenshot_handler::<M>))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve<M, F>(listen_addr: &str, evaluator: Evaluator<M>, shutdown: F) -> Result<()>
where
    M: StreamingModel + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address {listen_addr:?}: {e}")))?;

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "starting valuation API");

    axum::serve(listener, router(evaluator))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn dom_handler<M>(
    State(state): State<Arc<AppState<M>>>,
    payload: std::result::Result<Json<ValuationRequest>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, EvaluationError>
where
    M: StreamingModel + 'static,
{
    let Json(request) = payload.map_err(invalid_body)?;
    let result = state.evaluator.evaluate_dom(&request).await?;
    Ok(Json(result))
}

async fn screenshot_handler<M>(
    State(state): State<Arc<AppState<M>>>,
    payload: std::result::Result<Json<ValuationRequest>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, EvaluationError>
where
    M: StreamingModel + 'static,
{
    let Json(request) = payload.map_err(invalid_body)?;
    let result = state.evaluator.evaluate_screenshot(&request).await?;
    Ok(Json(result))
}

/// Body rejections answer with the same `{"error"}` shape as everything else
fn invalid_body(rejection: JsonRejection) -> EvaluationError {
    EvaluationError::InvalidRequest(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquirer::Acquirer;
    use crate::evaluation::EvaluatorConfig;
    use crate::model::MockStreamingModel;
    use serde_json::{Value, json};

    async fn start(model: MockStreamingModel) -> String {
        let evaluator = Evaluator::new(model, Acquirer::default(), EvaluatorConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(evaluator)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_valuation_success() {
        let model = MockStreamingModel::with_text(
            r#"{"matchScore": 88, "analysis": "Matches", "suggestions": ["Polish spacing"]}"#,
            16,
        )
        .await;
        let base = start(model).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/valuation"))
            .json(&json!({
                "url": "https://site.test",
                "initialRequirements": "a hero section",
                "html": "<html><body><h1>Hero</h1></body></html>"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["url"], "https://site.test");
        assert_eq!(body["evaluation"]["matchScore"], json!(88));
        assert_eq!(body["evaluation"]["suggestions"], json!(["Polish spacing"]));
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let base = start(MockStreamingModel::new()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/valuation"))
            .json(&json!({"initialRequirements": "a hero section"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error, "URL is required");

        let response = client
            .post(format!("{base}/api/valuation"))
            .json(&json!({"url": "https://site.test"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error, "Initial requirements are required");
    }

    #[tokio::test]
    async fn test_null_fields_are_reported_as_missing() {
        let base = start(MockStreamingModel::new()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/valuation"))
            .json(&json!({"url": null, "initialRequirements": "a hero"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error, "URL is required");
    }

    #[tokio::test]
    async fn test_unreadable_body_keeps_error_shape() {
        let base = start(MockStreamingModel::new()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/valuation"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert!(!body.error.is_empty());

        let response = client
            .post(format!("{base}/api/valuation"))
            .body(r#"{"url": "https://site.test", "initialRequirements": "a hero"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn test_evaluation_failure_is_500() {
        let base = start(MockStreamingModel::new()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/valuation/screenshot"))
            .json(&json!({"url": "https://site.test", "initialRequirements": "a hero"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error, "Screenshot capture is not configured");
    }
}
