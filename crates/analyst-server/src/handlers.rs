//! HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use agent_core::provider::ModelInfo;
use crypto_analyst::{AnalysisJob, AnalystError, ErrorKind, MarketReport};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub llm_configured: bool,
    pub llm_reachable: bool,
    pub market_data_source: String,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub provider: String,
    pub default_model: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Analyst error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub AnalystError);

impl From<AnalystError> for ApiError {
    fn from(err: AnalystError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AnalystError::InvalidInput(rejection.body_text()))
    }
}

pub fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "COIN_NOT_FOUND"),
        ErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        ErrorKind::Auth => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
        ErrorKind::Upstream => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = status_for(self.0.kind());
        if status.is_server_error() {
            tracing::error!(error = %self.0, %code, "Request failed");
        } else {
            tracing::warn!(error = %self.0, %code, "Request rejected");
        }

        let retry_after = match &self.0 {
            AnalystError::RateLimited {
                retry_after: Some(after),
                ..
            } => HeaderValue::from_str(&after.as_secs().to_string()).ok(),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: self.0.user_message(),
            code: code.into(),
        });

        let mut response = (status, body).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let llm_reachable = match state.provider() {
        Some(provider) => provider.health_check().await.unwrap_or(false),
        None => false,
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        llm_configured: state.provider().is_some(),
        llm_reachable,
        market_data_source: state.analyst.source_name().to_string(),
    })
}

/// Models offered by the configured LLM provider
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let requester = state.analyst.requester().ok_or_else(|| {
        AnalystError::Auth("no LLM provider is configured (set GROQ_API_KEY)".into())
    })?;

    let models = requester
        .provider()
        .list_models()
        .await
        .map_err(AnalystError::from)?;

    Ok(Json(ModelsResponse {
        provider: requester.provider().name().to_string(),
        default_model: requester.model().to_string(),
        models,
    }))
}

/// Fetch market data for a coin and optionally analyse it
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisJob>, JsonRejection>,
) -> Result<Json<MarketReport>, ApiError> {
    let Json(job) = payload?;

    let report = state.analyst.run(job).await?;
    Ok(Json(report))
}
