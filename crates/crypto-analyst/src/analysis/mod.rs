//! Analysis Requester
//!
//! Sends an `AnalysisRequest` to an LLM and turns the reply into an
//! `AnalysisResult`. Provider failures are errors; unusable model output is
//! not, it comes back as `AnalysisOutcome::Unstructured` with the raw text.

pub mod prompt;
mod result;

pub use result::{
    parse_analysis, AnalysisOutcome, AnalysisResult, ConfidenceLevel, KeyInsights,
    MarketAnalysis, PositionSizing, PriceZone, RiskWarnings, Scenarios, StopLevel, StopLoss,
    TakeProfit, TakeProfitLevels, TechnicalIndicators, Text, TimeHorizon, TradingAnalysis,
    TradingZones, TrendDirection,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_core::message::render_transcript;
use agent_core::{GenerationOptions, LlmProvider, Message};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::model::AnalysisRequest;

pub struct AnalysisRequester {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    /// Where `prompt.txt` / `response.txt` go when debugging
    debug_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AnalysisRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisRequester")
            .field("provider", &self.provider.name())
            .field("model", &self.options.model)
            .field("debug_dir", &self.debug_dir)
            .finish()
    }
}

impl AnalysisRequester {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            debug_dir: None,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &AnalysisConfig) -> Self {
        let requester = Self::new(provider, config.generation_options());
        match config.debug_dir() {
            Some(dir) => requester.with_debug_dir(dir),
            None => requester,
        }
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Request an analysis. One attempt, no retries.
    pub async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisResult> {
        let messages = vec![
            Message::system(prompt::SYSTEM_PROMPT),
            Message::user(prompt::render(request)?),
        ];

        if let Some(dir) = &self.debug_dir {
            write_artifact(dir, "prompt.txt", &render_transcript(&messages)).await;
        }

        tracing::info!(
            coin = %request.coin().id,
            provider = self.provider.name(),
            model = %self.options.model,
            "Requesting analysis"
        );
        let completion = self.provider.complete(&messages, &self.options).await?;

        if let Some(dir) = &self.debug_dir {
            write_artifact(dir, "response.txt", &completion.content).await;
        }

        if completion.truncated {
            tracing::warn!(model = %completion.model, "Analysis response was truncated");
        }

        let outcome = match parse_analysis(&completion.content) {
            Ok(analysis) => AnalysisOutcome::Structured { analysis },
            Err(reason) => {
                tracing::warn!(%reason, chars = completion.content.len(), "Analysis output is not structured");
                AnalysisOutcome::Unstructured { reason }
            }
        };

        Ok(AnalysisResult {
            model: completion.model,
            raw_text: completion.content,
            usage: completion.usage,
            outcome,
        })
    }
}

/// Debug artifacts are best effort
async fn write_artifact(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, contents).await
    }
    .await;

    match written {
        Ok(()) => tracing::debug!(path = %path.display(), "Wrote debug artifact"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to write debug artifact"),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted LLM provider for offline tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use agent_core::provider::{Completion, FinishReason, ModelInfo};
    use agent_core::AgentError;
    use async_trait::async_trait;

    use super::*;

    pub(crate) use super::result::SAMPLE_ANALYSIS;

    #[derive(Default)]
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<agent_core::Result<String>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        pub fn replying(text: &str) -> Self {
            Self::default().then(Ok(text.to_string()))
        }

        pub fn failing(err: AgentError) -> Self {
            Self::default().then(Err(err))
        }

        pub fn then(self, reply: agent_core::Result<String>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_messages(&self) -> Option<Vec<Message>> {
            self.seen.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages.to_vec());

            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Provider("no scripted reply left".into())));

            reply.map(|content| Completion {
                content,
                model: options.model.clone(),
                usage: None,
                truncated: false,
                finish_reason: Some(FinishReason::Stop),
            })
        }

        async fn list_models(&self) -> agent_core::Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use agent_core::AgentError;
    use rust_decimal_macros::dec;

    use super::result::SAMPLE_ANALYSIS;
    use super::testing::ScriptedProvider;
    use super::*;
    use crate::error::AnalystError;
    use crate::model::{
        CanonicalCoin, GlobalMarketContext, HistoricalSeries, MarketSnapshot, Timeframe,
    };

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            coin: CanonicalCoin::new("bitcoin", "Bitcoin", "btc"),
            current_price: Some(dec!(97500)),
            market_cap: Some(dec!(1930000000000)),
            market_cap_rank: Some(1),
            fully_diluted_valuation: None,
            total_volume_24h: Some(dec!(25000000000)),
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            price_change_24h: Some(dec!(2.5)),
            price_change_7d: None,
            price_change_30d: None,
            price_change_1y: None,
            ath: None,
            ath_date: None,
            atl: None,
            atl_date: None,
            last_updated: None,
        }
    }

    async fn analyze_with(provider: Arc<ScriptedProvider>) -> Result<AnalysisResult> {
        let snapshot = snapshot();
        let series = HistoricalSeries::new(Timeframe::Weekly, Vec::new());
        let global = GlobalMarketContext::default();
        let request = AnalysisRequest::new(&snapshot, &series, &global, &[]);

        AnalysisRequester::new(provider, GenerationOptions::default())
            .analyze(&request)
            .await
    }

    #[tokio::test]
    async fn test_structured_output() {
        let provider = Arc::new(ScriptedProvider::replying(SAMPLE_ANALYSIS));
        let result = analyze_with(provider.clone()).await.unwrap();

        let analysis = result.structured().expect("structured analysis");
        assert!(matches!(
            analysis.market_analysis.current_trend,
            TrendDirection::Bullish | TrendDirection::Bearish | TrendDirection::Sideways
        ));
        assert!(!analysis.trading_zones.primary_buy_zone.price_range.is_blank());
        assert!(!analysis.take_profit_levels.tp1_conservative.price.is_blank());
        assert!(!analysis.stop_loss.conservative_sl.price.is_blank());
        assert!(analysis.technical_indicators.rsi_14.is_some());
        assert!(analysis.time_horizon.short_term_1_7_days.is_some());
        assert!(analysis.position_sizing.maximum_risk.is_some());
        assert!(!analysis.risk_warnings.high_risk_factors.is_empty());
        assert!(analysis.key_insights.market_context.is_some());
        assert_eq!(result.model, "openai/gpt-oss-20b");
        assert_eq!(provider.calls(), 1);

        let messages = provider.last_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("\"bitcoin\""));
    }

    #[tokio::test]
    async fn test_prose_output_is_unstructured() {
        let prose = "Bitcoin is in a healthy uptrend; accumulate on dips near support.";
        let provider = Arc::new(ScriptedProvider::replying(prose));
        let result = analyze_with(provider).await.unwrap();

        assert!(!result.is_structured());
        assert_eq!(result.raw_text, prose);
        assert!(matches!(result.outcome, AnalysisOutcome::Unstructured { .. }));
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::failing(AgentError::Auth("Invalid API Key".into())));
        assert!(matches!(analyze_with(provider).await, Err(AnalystError::Auth(_))));

        let provider = Arc::new(ScriptedProvider::failing(AgentError::RateLimited("429".into())));
        assert!(matches!(
            analyze_with(provider.clone()).await,
            Err(AnalystError::RateLimited { .. })
        ));
        // Not retried
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_debug_artifacts_written() {
        let dir = std::env::temp_dir().join(format!("analyst-debug-{}", uuid::Uuid::new_v4()));
        let provider = Arc::new(ScriptedProvider::replying("not json"));

        let snapshot = snapshot();
        let series = HistoricalSeries::new(Timeframe::Daily, Vec::new());
        let global = GlobalMarketContext::default();
        let request = AnalysisRequest::new(&snapshot, &series, &global, &[]);

        AnalysisRequester::new(provider, GenerationOptions::default())
            .with_debug_dir(&dir)
            .analyze(&request)
            .await
            .unwrap();

        let prompt = tokio::fs::read_to_string(dir.join("prompt.txt")).await.unwrap();
        let response = tokio::fs::read_to_string(dir.join("response.txt")).await.unwrap();
        assert!(prompt.contains("### system"));
        assert!(prompt.contains("\"daily\""));
        assert_eq!(response, "not json");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_from_config_uses_model_and_debug_settings() {
        let config = AnalysisConfig {
            model: "llama-3.3-70b-versatile".into(),
            ..AnalysisConfig::default()
        };
        let requester =
            AnalysisRequester::from_config(Arc::new(ScriptedProvider::default()), &config);

        assert_eq!(requester.model(), "llama-3.3-70b-versatile");
        assert!(requester.options.json_mode);
        assert!(requester.debug_dir.is_none());
    }
}
