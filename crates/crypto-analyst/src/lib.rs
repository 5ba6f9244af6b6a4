//! # crypto-analyst
//!
//! Cryptocurrency market data retrieval and LLM-backed trading analysis.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌───────────────────┐
//! │ CoinResolver │──▶│ MarketDataSource  │──▶│ AnalysisRequester │
//! │ "btc" → id   │   │ CoinGecko / mock  │   │ LlmProvider       │
//! └──────────────┘   └───────────────────┘   └───────────────────┘
//!          └──────────────── MarketAnalyst ─────────────────┘
//! ```
//!
//! Market data is fetched politely: every upstream request waits on a
//! shared spacer, and rate-limit, timeout and transient failures are retried
//! with exponential backoff. The LLM call is made once; output that cannot
//! be parsed is returned as raw text instead of failing the run.

pub mod analysis;
pub mod config;
pub mod error;
pub mod http;
pub mod market;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod throttle;

pub use analysis::{AnalysisOutcome, AnalysisRequester, AnalysisResult, TradingAnalysis};
pub use config::AnalystConfig;
pub use error::{AnalystError, ErrorKind, Result};
pub use market::{CoinGeckoClient, MarketDataSource, MockMarketData};
pub use model::{
    AnalysisRequest, CanonicalCoin, GlobalMarketContext, HistoricalSeries, MarketSnapshot,
    PricePoint, Timeframe, TrendingCoin,
};
pub use pipeline::{AnalysisJob, MarketAnalyst, MarketReport};
pub use resolver::CoinResolver;
