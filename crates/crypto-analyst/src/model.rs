//! Domain Models
//!
//! Normalized market records produced once per invocation and never mutated.
//! Uses `rust_decimal` for all prices, volumes and percentages - upstream
//! floats are converted exactly once, at the normalization boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AnalystError;

/// Requested span of historical data
///
/// Deserializes through `FromStr`, so aliases like `"7d"` are accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Timeframe {
    /// Last 24 hours
    Daily,
    /// Last 7 days
    #[default]
    Weekly,
    /// Last 30 days
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    /// Days of history requested from the market-chart endpoint
    pub fn days(self) -> u32 {
        match self {
            Timeframe::Daily => 1,
            Timeframe::Weekly => 7,
            Timeframe::Monthly => 30,
        }
    }

    /// Explicit sampling interval, `None` lets the upstream pick its default
    pub fn interval(self) -> Option<&'static str> {
        match self {
            Timeframe::Daily => None,
            Timeframe::Weekly | Timeframe::Monthly => Some("daily"),
        }
    }

    /// Nominal number of samples for the span (hourly for a day, daily otherwise)
    pub fn nominal_points(self) -> usize {
        match self {
            Timeframe::Daily => 24,
            Timeframe::Weekly => 7,
            Timeframe::Monthly => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "1d" => Ok(Timeframe::Daily),
            "weekly" | "week" | "7d" => Ok(Timeframe::Weekly),
            "monthly" | "month" | "30d" => Ok(Timeframe::Monthly),
            other => Err(AnalystError::InvalidInput(format!(
                "unknown timeframe '{other}' (expected daily, weekly or monthly)"
            ))),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = AnalystError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Canonical identity of a coin in the market-data API
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalCoin {
    /// Canonical id (e.g., "bitcoin")
    pub id: String,

    /// Display name (e.g., "Bitcoin")
    pub name: String,

    /// Trading symbol as listed upstream (e.g., "btc")
    pub symbol: String,
}

impl CanonicalCoin {
    pub fn new(id: impl Into<String>, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// Entry of the full coin list used for resolution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinListing {
    pub id: String,
    pub symbol: String,
    pub name: String,

    /// Market-cap rank (1 = largest), when rank metadata is available
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

impl CoinListing {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            market_cap_rank: None,
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.market_cap_rank = Some(rank);
        self
    }

    pub fn to_canonical(&self) -> CanonicalCoin {
        CanonicalCoin::new(&self.id, &self.name, &self.symbol)
    }
}

/// Point-in-time market metrics for one coin (USD)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub coin: CanonicalCoin,
    pub current_price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub market_cap_rank: Option<u32>,
    pub fully_diluted_valuation: Option<Decimal>,
    pub total_volume_24h: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
    pub total_supply: Option<Decimal>,
    pub max_supply: Option<Decimal>,

    /// Price change percentages
    pub price_change_24h: Option<Decimal>,
    pub price_change_7d: Option<Decimal>,
    pub price_change_30d: Option<Decimal>,
    pub price_change_1y: Option<Decimal>,

    /// All-time records
    pub ath: Option<Decimal>,
    pub ath_date: Option<DateTime<Utc>>,
    pub atl: Option<Decimal>,
    pub atl_date: Option<DateTime<Utc>>,

    pub last_updated: Option<DateTime<Utc>>,
}

/// One historical sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub date: DateTime<Utc>,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub market_cap: Option<Decimal>,
}

/// Time-ordered price history
///
/// Points are strictly ascending by timestamp with no duplicates; the
/// constructor enforces this.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "SeriesParts")]
pub struct HistoricalSeries {
    timeframe: Timeframe,
    points: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct SeriesParts {
    timeframe: Timeframe,
    points: Vec<PricePoint>,
}

impl From<SeriesParts> for HistoricalSeries {
    fn from(parts: SeriesParts) -> Self {
        Self::new(parts.timeframe, parts.points)
    }
}

impl HistoricalSeries {
    /// Sort ascending and drop repeated timestamps (first occurrence wins)
    pub fn new(timeframe: Timeframe, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self { timeframe, points }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Open/close/high/low over the series
    pub fn summary(&self) -> Option<SeriesSummary> {
        let first = self.points.first()?;
        let last = self.points.last()?;

        let high = self.points.iter().map(|p| p.price).max()?;
        let low = self.points.iter().map(|p| p.price).min()?;

        let change_pct = if first.price > Decimal::ZERO {
            Some(((last.price - first.price) / first.price * Decimal::ONE_HUNDRED).round_dp(2))
        } else {
            None
        };

        Some(SeriesSummary {
            open: first.price,
            close: last.price,
            high,
            low,
            change_pct,
            samples: self.points.len(),
            from: first.date,
            to: last.date,
        })
    }
}

/// Aggregate view of a series, embedded in the analysis prompt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub change_pct: Option<Decimal>,
    pub samples: usize,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Market-wide statistics independent of any single coin
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GlobalMarketContext {
    pub total_market_cap_usd: Option<Decimal>,
    pub total_volume_24h_usd: Option<Decimal>,
    pub btc_dominance: Option<Decimal>,
    pub eth_dominance: Option<Decimal>,
    pub active_cryptocurrencies: Option<u64>,
    pub markets: Option<u64>,
    pub market_cap_change_24h: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A coin from the trending-search list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    pub price_btc: Option<Decimal>,
}

/// The document handed to the LLM
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisRequest<'a> {
    pub snapshot: &'a MarketSnapshot,
    pub timeframe: Timeframe,
    pub history_summary: Option<SeriesSummary>,
    pub history: &'a [PricePoint],
    pub global: &'a GlobalMarketContext,
    #[serde(skip_serializing_if = "<[TrendingCoin]>::is_empty")]
    pub trending: &'a [TrendingCoin],
}

impl<'a> AnalysisRequest<'a> {
    pub fn new(
        snapshot: &'a MarketSnapshot,
        history: &'a HistoricalSeries,
        global: &'a GlobalMarketContext,
        trending: &'a [TrendingCoin],
    ) -> Self {
        Self {
            snapshot,
            timeframe: history.timeframe(),
            history_summary: history.summary(),
            history: history.points(),
            global,
            trending,
        }
    }

    pub fn coin(&self) -> &CanonicalCoin {
        &self.snapshot.coin
    }
}

/// Convert an upstream float, dropping NaN/infinite/out-of-range values
pub(crate) fn decimal_from_f64(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(dp).normalize())
}

/// Convert a millisecond timestamp to UTC
pub(crate) fn datetime_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
