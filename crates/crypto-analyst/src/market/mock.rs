//! Mock Market Data
//!
//! For testing and demo purposes. Returns realistic static market data for a
//! handful of coins, including a low-ranked coin sharing bitcoin's symbol.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::MarketDataSource;
use crate::error::{AnalystError, Result};
use crate::model::{
    CanonicalCoin, CoinListing, GlobalMarketContext, HistoricalSeries, MarketSnapshot,
    PricePoint, Timeframe, TrendingCoin,
};

/// 2025-01-10T00:00:00Z, the newest sample of every mock series
const ANCHOR_MS: i64 = 1_736_467_200_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;

struct MockCoin {
    id: &'static str,
    symbol: &'static str,
    name: &'static str,
    rank: u32,
    price: Decimal,
    change_24h: Decimal,
    volume: Decimal,
    supply: Decimal,
}

const COINS: &[MockCoin] = &[
    MockCoin {
        id: "bitcoin",
        symbol: "btc",
        name: "Bitcoin",
        rank: 1,
        price: dec!(97500),
        change_24h: dec!(2.5),
        volume: dec!(25_000_000_000),
        supply: dec!(19_800_000),
    },
    MockCoin {
        id: "ethereum",
        symbol: "eth",
        name: "Ethereum",
        rank: 2,
        price: dec!(3450),
        change_24h: dec!(1.8),
        volume: dec!(15_000_000_000),
        supply: dec!(120_500_000),
    },
    MockCoin {
        id: "solana",
        symbol: "sol",
        name: "Solana",
        rank: 6,
        price: dec!(195),
        change_24h: dec!(4.2),
        volume: dec!(3_000_000_000),
        supply: dec!(480_000_000),
    },
    MockCoin {
        id: "cardano",
        symbol: "ada",
        name: "Cardano",
        rank: 9,
        price: dec!(0.95),
        change_24h: dec!(-1.2),
        volume: dec!(900_000_000),
        supply: dec!(35_000_000_000),
    },
    MockCoin {
        id: "batcat",
        symbol: "btc",
        name: "Batcat",
        rank: 4_812,
        price: dec!(0.000022),
        change_24h: dec!(-8.0),
        volume: dec!(1_200),
        supply: dec!(1_000_000_000),
    },
];

/// Mock market data source with static coins
#[derive(Debug, Clone, Default)]
pub struct MockMarketData {
    trending_unavailable: bool,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `fetch_trending` fail, for exercising degraded reports
    pub fn with_trending_unavailable(mut self) -> Self {
        self.trending_unavailable = true;
        self
    }

    fn find(id: &str) -> Result<&'static MockCoin> {
        COINS
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AnalystError::NotFound(id.to_string()))
    }
}

fn anchor() -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ANCHOR_MS)
}

/// Deterministic zig-zag around the base price: -2%..+2%
fn wobble(price: Decimal, step: usize) -> Decimal {
    let offset = Decimal::from(i64::try_from(step % 5).unwrap_or(0) - 2);
    (price * (Decimal::ONE + offset / Decimal::ONE_HUNDRED)).round_dp(8)
}

#[async_trait]
impl MarketDataSource for MockMarketData {
    async fn coin_list(&self) -> Result<Vec<CoinListing>> {
        Ok(COINS
            .iter()
            .map(|c| CoinListing::new(c.id, c.symbol, c.name).with_rank(c.rank))
            .collect())
    }

    async fn fetch_current(&self, coin: &CanonicalCoin) -> Result<MarketSnapshot> {
        let mock = Self::find(&coin.id)?;

        Ok(MarketSnapshot {
            coin: CanonicalCoin::new(mock.id, mock.name, mock.symbol),
            current_price: Some(mock.price),
            market_cap: Some((mock.price * mock.supply).round_dp(2)),
            market_cap_rank: Some(mock.rank),
            fully_diluted_valuation: None,
            total_volume_24h: Some(mock.volume),
            circulating_supply: Some(mock.supply),
            total_supply: None,
            max_supply: None,
            price_change_24h: Some(mock.change_24h),
            price_change_7d: Some(mock.change_24h * dec!(1.5)),
            price_change_30d: Some(mock.change_24h * dec!(3)),
            price_change_1y: None,
            ath: Some((mock.price * dec!(1.1)).round_dp(8)),
            ath_date: anchor(),
            atl: None,
            atl_date: None,
            last_updated: anchor(),
        })
    }

    async fn fetch_history(
        &self,
        coin: &CanonicalCoin,
        timeframe: Timeframe,
    ) -> Result<HistoricalSeries> {
        let mock = Self::find(&coin.id)?;
        let step_ms = match timeframe {
            Timeframe::Daily => HOUR_MS,
            Timeframe::Weekly | Timeframe::Monthly => DAY_MS,
        };
        let count = timeframe.nominal_points();

        let points = (0..count)
            .filter_map(|i| {
                let back = i64::try_from(count - 1 - i).ok()?;
                let timestamp = ANCHOR_MS - back * step_ms;
                Some(PricePoint {
                    timestamp,
                    date: DateTime::from_timestamp_millis(timestamp)?,
                    price: wobble(mock.price, i),
                    volume: Some(mock.volume),
                    market_cap: Some((wobble(mock.price, i) * mock.supply).round_dp(2)),
                })
            })
            .collect();

        Ok(HistoricalSeries::new(timeframe, points))
    }

    async fn fetch_global(&self) -> Result<GlobalMarketContext> {
        Ok(GlobalMarketContext {
            total_market_cap_usd: Some(dec!(3_400_000_000_000)),
            total_volume_24h_usd: Some(dec!(120_000_000_000)),
            btc_dominance: Some(dec!(56.8)),
            eth_dominance: Some(dec!(12.3)),
            active_cryptocurrencies: Some(15_000),
            markets: Some(1_100),
            market_cap_change_24h: Some(dec!(-0.75)),
            updated_at: anchor(),
        })
    }

    async fn fetch_trending(&self) -> Result<Vec<TrendingCoin>> {
        if self.trending_unavailable {
            return Err(AnalystError::transient("trending endpoint unavailable"));
        }

        Ok(COINS
            .iter()
            .skip(2)
            .map(|c| TrendingCoin {
                id: c.id.into(),
                name: c.name.into(),
                symbol: c.symbol.into(),
                market_cap_rank: Some(c.rank),
                price_btc: Some((c.price / dec!(97500)).round_dp(12)),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "MockMarketData"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_snapshot() {
        let source = MockMarketData::new();
        let coin = CanonicalCoin::new("bitcoin", "Bitcoin", "btc");

        let snapshot = source.fetch_current(&coin).await.unwrap();
        assert_eq!(snapshot.coin.id, "bitcoin");
        assert!(snapshot.current_price.unwrap() > Decimal::ZERO);
        assert_eq!(snapshot.market_cap_rank, Some(1));
    }

    #[tokio::test]
    async fn test_mock_series_lengths() {
        let source = MockMarketData::new();
        let coin = CanonicalCoin::new("ethereum", "Ethereum", "eth");

        for timeframe in Timeframe::ALL {
            let series = source.fetch_history(&coin, timeframe).await.unwrap();
            assert_eq!(series.len(), timeframe.nominal_points());
            assert!(series.points().iter().all(|p| p.price > Decimal::ZERO));
            assert_eq!(series.points().last().unwrap().timestamp, ANCHOR_MS);
        }
    }

    #[tokio::test]
    async fn test_unknown_coin() {
        let source = MockMarketData::new();
        let coin = CanonicalCoin::new("notreal", "Not Real", "nr");
        assert!(matches!(
            source.fetch_current(&coin).await,
            Err(AnalystError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_trending_can_be_disabled() {
        let source = MockMarketData::new().with_trending_unavailable();
        assert!(source.fetch_trending().await.is_err());
        assert!(!MockMarketData::new().fetch_trending().await.unwrap().is_empty());
    }
}
