//! HTTP surface: a single `/search` route over the pipeline.
//!
//! The route is a thin request/response boundary; all pipeline semantics
//! live in [`crate::pipeline`]. Errors map onto status codes by class:
//! user-correctable failures are 400, an unreachable index is 503, and
//! everything else is 500.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::pipeline::SearchPipeline;
use crate::types::{SearchError, SearchResult};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub url: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Builds the application router. CORS is wide open, matching the original
/// single-tenant deployment.
pub fn router(pipeline: Arc<SearchPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(search))
        .layer(cors)
        .with_state(pipeline)
}

async fn search(
    State(pipeline): State<Arc<SearchPipeline>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = pipeline.search(&request.url, &request.query).await?;
    Ok(Json(SearchResponse { results }))
}

/// Wrapper turning pipeline errors into JSON error responses.
pub struct ApiError(SearchError);

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        ApiError(err)
    }
}

pub(crate) fn error_status(err: &SearchError) -> StatusCode {
    if err.is_user_error() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, SearchError::IndexUnavailable { .. }) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = error_status(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "search request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
