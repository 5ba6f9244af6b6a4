//! Router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{analyze, health_check, list_models};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Analyst API
        .route("/api/analyze", post(analyze))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use agent_core::provider::{Completion, ModelInfo};
    use agent_core::{GenerationOptions, LlmProvider, Message};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use crypto_analyst::{AnalysisRequester, AnalystError, MarketAnalyst, MockMarketData};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::handlers::ApiError;

    /// Always answers with the same text
    struct FixedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            Ok(Completion {
                content: self.0.to_string(),
                model: options.model.clone(),
                usage: None,
                truncated: false,
                finish_reason: None,
            })
        }

        async fn list_models(&self) -> agent_core::Result<Vec<ModelInfo>> {
            Ok(vec![ModelInfo {
                id: "openai/gpt-oss-20b".into(),
                owned_by: Some("openai".into()),
                context_length: Some(131_072),
            }])
        }
    }

    fn app(provider: Option<&'static str>) -> Router {
        let analyst = MarketAnalyst::new(Arc::new(MockMarketData::new()));
        let analyst = match provider {
            Some(reply) => analyst.with_requester(AnalysisRequester::new(
                Arc::new(FixedProvider(reply)),
                GenerationOptions::default(),
            )),
            None => analyst,
        };
        router(AppState::new(analyst))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_analyze(body: &str) -> Request<Body> {
        Request::post("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(None), Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["llm_configured"], false);
        assert_eq!(body["market_data_source"], "MockMarketData");
    }

    #[tokio::test]
    async fn test_analyze_data_only() {
        let (status, body) = send(app(None), post_analyze(r#"{"coin": "btc", "analyze": false}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coin"]["id"], "bitcoin");
        assert_eq!(body["timeframe"], "weekly");
        assert_eq!(body["history"]["points"].as_array().unwrap().len(), 7);
        assert!(body["analysis"].is_null());
    }

    #[tokio::test]
    async fn test_analyze_accepts_timeframe_aliases() {
        let (status, body) = send(
            app(None),
            post_analyze(r#"{"coin": "btc", "timeframe": "30d", "analyze": false}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timeframe"], "monthly");

        let (status, body) = send(app(None), post_analyze(r#"{"coin": "btc", "timeframe": "quarterly"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_analyze_with_unstructured_reply() {
        let (status, body) = send(
            app(Some("Looks bullish to me.")),
            post_analyze(r#"{"coin": "ethereum", "timeframe": "daily"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analysis"]["status"], "unstructured");
        assert_eq!(body["analysis"]["raw_text"], "Looks bullish to me.");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (status, body) = send(app(None), post_analyze(r#"{"coin": "zzz-not-listed", "analyze": false}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "COIN_NOT_FOUND");

        let (status, _) = send(app(None), post_analyze(r#"{"coin": "btc", "timeframe": "quarterly"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app(None), post_analyze("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app(None), post_analyze(r#"{"coin": "btc"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_ERROR");
    }

    #[tokio::test]
    async fn test_models() {
        let request = || Request::get("/api/models").body(Body::empty()).unwrap();

        let (status, _) = send(app(None), request()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(app(Some("{}")), request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"][0]["id"], "openai/gpt-oss-20b");
    }

    #[test]
    fn test_upstream_error_mapping() {
        let cases = [
            (AnalystError::upstream("HTTP 400"), StatusCode::BAD_GATEWAY),
            (AnalystError::Timeout("slow".into()), StatusCode::GATEWAY_TIMEOUT),
            (AnalystError::Config("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }

        let response = ApiError(AnalystError::RateLimited {
            service: "CoinGecko".into(),
            retry_after: Some(Duration::from_secs(30)),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "30");
    }
}
