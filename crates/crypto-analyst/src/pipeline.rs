//! Orchestrator
//!
//! One invocation: resolve the coin, fetch current, historical and global
//! data, optionally the trending list, then optionally ask the LLM.
//!
//! ```text
//! resolve ──▶ ┌ current ┐
//!             ├ history ├──▶ trending? ──▶ analysis? ──▶ MarketReport
//!             └ global  ┘
//! ```

use std::sync::Arc;

use agent_core::LlmProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{AnalysisRequester, AnalysisResult};
use crate::config::{AnalystConfig, MarketSourceKind};
use crate::error::{AnalystError, Result};
use crate::market::{CoinGeckoClient, MarketDataSource, MockMarketData};
use crate::model::{
    AnalysisRequest, CanonicalCoin, GlobalMarketContext, HistoricalSeries, MarketSnapshot,
    Timeframe, TrendingCoin,
};
use crate::resolver::CoinResolver;

/// What to produce for one coin
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Free-form identifier: id, symbol or name
    pub coin: String,

    #[serde(default)]
    pub timeframe: Timeframe,

    /// Request an LLM analysis
    #[serde(default = "default_true")]
    pub analyze: bool,

    /// Include the trending-coins list in the report (and the prompt)
    #[serde(default)]
    pub include_trending: bool,
}

fn default_true() -> bool {
    true
}

impl AnalysisJob {
    pub fn new(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            timeframe: Timeframe::default(),
            analyze: true,
            include_trending: false,
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn data_only(mut self) -> Self {
        self.analyze = false;
        self
    }

    pub fn with_trending(mut self) -> Self {
        self.include_trending = true;
        self
    }
}

/// Everything gathered for one job
#[derive(Clone, Debug, Serialize)]
pub struct MarketReport {
    pub request_id: Uuid,
    pub coin: CanonicalCoin,
    pub timeframe: Timeframe,
    pub snapshot: MarketSnapshot,
    pub history: HistoricalSeries,
    pub global: GlobalMarketContext,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trending: Vec<TrendingCoin>,
    pub analysis: Option<AnalysisResult>,
    /// Market data source name
    pub data_source: String,
    pub generated_at: DateTime<Utc>,
}

/// Market analyst: resolver, market data and (optionally) an LLM
pub struct MarketAnalyst {
    source: Arc<dyn MarketDataSource>,
    resolver: CoinResolver,
    requester: Option<AnalysisRequester>,
}

impl std::fmt::Debug for MarketAnalyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketAnalyst")
            .field("source", &self.source.name())
            .field("requester", &self.requester)
            .finish_non_exhaustive()
    }
}

impl MarketAnalyst {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            resolver: CoinResolver::new(source.clone()),
            source,
            requester: None,
        }
    }

    /// Wire source and requester from configuration
    pub fn from_config(config: &AnalystConfig, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        let source: Arc<dyn MarketDataSource> = match config.market_source {
            MarketSourceKind::CoinGecko => Arc::new(CoinGeckoClient::new(config.coingecko.clone())),
            MarketSourceKind::Mock => Arc::new(MockMarketData::new()),
        };

        let analyst = Self::new(source);
        match provider {
            Some(provider) => analyst.with_requester(AnalysisRequester::from_config(
                provider,
                &config.analysis,
            )),
            None => analyst,
        }
    }

    pub fn with_requester(mut self, requester: AnalysisRequester) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn requester(&self) -> Option<&AnalysisRequester> {
        self.requester.as_ref()
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub async fn resolve(&self, input: &str) -> Result<CanonicalCoin> {
        self.resolver.resolve(input).await
    }

    /// Run one job end to end
    pub async fn run(&self, job: AnalysisJob) -> Result<MarketReport> {
        let requester = match (&self.requester, job.analyze) {
            (None, true) => {
                return Err(AnalystError::Auth(
                    "analysis requested but no LLM provider is configured (set GROQ_API_KEY)".into(),
                ));
            }
            (Some(requester), true) => Some(requester),
            (_, false) => None,
        };

        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, coin = %job.coin, timeframe = %job.timeframe, analyze = job.analyze, "Starting market analysis");

        let coin = self.resolve(&job.coin).await?;

        let (snapshot, history, global) = tokio::try_join!(
            self.source.fetch_current(&coin),
            self.source.fetch_history(&coin, job.timeframe),
            self.source.fetch_global(),
        )?;

        let trending = if job.include_trending {
            self.source.fetch_trending().await.unwrap_or_else(|e| {
                tracing::warn!(%request_id, error = %e, "Trending coins unavailable, continuing without them");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let analysis = match requester {
            Some(requester) => {
                let request = AnalysisRequest::new(&snapshot, &history, &global, &trending);
                Some(requester.analyze(&request).await?)
            }
            None => None,
        };

        tracing::info!(
            %request_id,
            coin = %coin.id,
            points = history.len(),
            structured = analysis.as_ref().map(AnalysisResult::is_structured),
            "Market analysis complete"
        );

        Ok(MarketReport {
            request_id,
            coin,
            timeframe: job.timeframe,
            snapshot,
            history,
            global,
            trending,
            analysis,
            data_source: self.source.name().to_string(),
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{ScriptedProvider, SAMPLE_ANALYSIS};
    use agent_core::GenerationOptions;

    fn analyst_with(provider: Arc<ScriptedProvider>) -> MarketAnalyst {
        MarketAnalyst::new(Arc::new(MockMarketData::new()))
            .with_requester(AnalysisRequester::new(provider, GenerationOptions::default()))
    }

    #[test]
    fn test_job_defaults_from_json() {
        let job: AnalysisJob = serde_json::from_str(r#"{"coin": "btc"}"#).unwrap();
        assert_eq!(job, AnalysisJob::new("btc"));
        assert_eq!(job.timeframe, Timeframe::Weekly);
        assert!(job.analyze);
        assert!(!job.include_trending);
    }

    #[tokio::test]
    async fn test_missing_provider_short_circuits() {
        let analyst = MarketAnalyst::new(Arc::new(MockMarketData::new()));
        let err = analyst.run(AnalysisJob::new("btc")).await.unwrap_err();
        assert!(matches!(err, AnalystError::Auth(_)));
    }

    #[tokio::test]
    async fn test_data_only_never_calls_llm() {
        let provider = Arc::new(ScriptedProvider::default());
        let report = analyst_with(provider.clone())
            .run(AnalysisJob::new("bitcoin").data_only())
            .await
            .unwrap();

        assert!(report.analysis.is_none());
        assert_eq!(provider.calls(), 0);
        assert_eq!(report.data_source, "MockMarketData");
    }

    #[tokio::test]
    async fn test_trending_failure_degrades() {
        let analyst = MarketAnalyst::new(Arc::new(MockMarketData::new().with_trending_unavailable()));
        let report = analyst
            .run(AnalysisJob::new("eth").data_only().with_trending())
            .await
            .unwrap();

        assert_eq!(report.coin.id, "ethereum");
        assert!(report.trending.is_empty());
    }

    #[tokio::test]
    async fn test_trending_reaches_prompt() {
        let provider = Arc::new(ScriptedProvider::replying(SAMPLE_ANALYSIS));
        let report = analyst_with(provider.clone())
            .run(AnalysisJob::new("sol").with_trending())
            .await
            .unwrap();

        assert!(!report.trending.is_empty());
        assert!(report.analysis.unwrap().is_structured());
        let messages = provider.last_messages().unwrap();
        assert!(messages[1].content.contains("\"trending\""));
    }

    #[tokio::test]
    async fn test_unknown_coin_fails_before_fetching() {
        let provider = Arc::new(ScriptedProvider::default());
        let err = analyst_with(provider.clone())
            .run(AnalysisJob::new("definitely-not-listed"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalystError::NotFound(_)));
        assert_eq!(provider.calls(), 0);
    }
}
