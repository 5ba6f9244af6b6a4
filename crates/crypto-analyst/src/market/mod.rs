//! Market Data Sources
//!
//! Abstractions and implementations for cryptocurrency market-data APIs.

mod coingecko;
mod mock;

pub use coingecko::CoinGeckoClient;
pub use mock::MockMarketData;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    CanonicalCoin, CoinListing, GlobalMarketContext, HistoricalSeries, MarketSnapshot,
    Timeframe, TrendingCoin,
};

/// Market data source trait (Strategy pattern)
///
/// Every fetch returns normalized records; wire formats never leave the
/// implementation.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Full list of known coins, used for identifier resolution
    async fn coin_list(&self) -> Result<Vec<CoinListing>>;

    /// Current market metrics for a resolved coin
    async fn fetch_current(&self, coin: &CanonicalCoin) -> Result<MarketSnapshot>;

    /// Price history for the timeframe, ascending and de-duplicated
    async fn fetch_history(
        &self,
        coin: &CanonicalCoin,
        timeframe: Timeframe,
    ) -> Result<HistoricalSeries>;

    /// Market-wide statistics
    async fn fetch_global(&self) -> Result<GlobalMarketContext>;

    /// Currently trending coins (at most 10)
    async fn fetch_trending(&self) -> Result<Vec<TrendingCoin>>;

    /// Source name
    fn name(&self) -> &str;
}
