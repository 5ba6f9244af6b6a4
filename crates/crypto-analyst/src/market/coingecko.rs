//! CoinGecko Client
//!
//! REST client for the CoinGecko v3 API. Each response is parsed into a
//! private wire struct whose fields are all optional, then converted into
//! the domain model by exactly one function per entity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::MarketDataSource;
use crate::config::CoinGeckoConfig;
use crate::error::{AnalystError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::model::{
    datetime_from_millis, decimal_from_f64, CanonicalCoin, CoinListing, GlobalMarketContext,
    HistoricalSeries, MarketSnapshot, PricePoint, Timeframe, TrendingCoin,
};
use crate::throttle::RequestSpacer;

const SERVICE: &str = "CoinGecko";

/// Coins per `/coins/markets` page used for rank metadata
const RANKED_PAGE_SIZE: u32 = 250;

const MAX_TRENDING: usize = 10;

const PRICE_DP: u32 = 8;
const AMOUNT_DP: u32 = 2;
const PERCENT_DP: u32 = 4;

/// What a request fetches. Only coin-scoped lookups report 404 as `NotFound`.
#[derive(Clone, Copy, Debug)]
enum Resource<'a> {
    Coin(&'a str),
    Market(&'static str),
}

impl Resource<'_> {
    fn label(&self) -> &str {
        match self {
            Resource::Coin(id) => id,
            Resource::Market(name) => name,
        }
    }
}

/// CoinGecko market data client
pub struct CoinGeckoClient {
    transport: Arc<dyn HttpTransport>,
    config: CoinGeckoConfig,
    spacer: RequestSpacer,
}

impl std::fmt::Debug for CoinGeckoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinGeckoClient")
            .field("base_url", &self.config.base_url)
            .field("tier", &self.config.tier)
            .field("spacing", &self.spacer.min_interval())
            .finish_non_exhaustive()
    }
}

impl CoinGeckoClient {
    /// Client over the default `reqwest` transport
    pub fn new(config: CoinGeckoConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::default()))
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(CoinGeckoConfig::from_env()?))
    }

    pub fn with_transport(config: CoinGeckoConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let spacer = RequestSpacer::new(config.request_spacing);
        Self {
            transport,
            config,
            spacer,
        }
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let raw = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        let parsed = if params.is_empty() {
            reqwest::Url::parse(&raw)
        } else {
            reqwest::Url::parse_with_params(&raw, params.iter().map(|(k, v)| (*k, v.as_str())))
        };

        parsed
            .map(String::from)
            .map_err(|e| AnalystError::Config(format!("invalid CoinGecko URL '{raw}': {e}")))
    }

    /// GET and decode `url`, retried per the configured policy.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, resource: Resource<'_>) -> Result<T> {
        self.config
            .retry
            .run(resource.label(), || self.get_json_once(url, resource))
            .await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: Resource<'_>,
    ) -> Result<T> {
        self.spacer.acquire().await;

        let mut request = HttpRequest::get(url).with_timeout(self.config.timeout);
        if let Some((header, key)) = self.config.auth_header() {
            request = request.with_header(header, key);
        }

        tracing::debug!(%url, "CoinGecko request");
        let response = self.transport.execute(request).await?;
        check_status(&response, resource)?;

        if response.body.trim().is_empty() {
            return Err(AnalystError::upstream(format!(
                "empty response body for {}",
                resource.label()
            )));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            AnalystError::upstream(format!(
                "malformed {SERVICE} payload for {}: {e}",
                resource.label()
            ))
        })
    }

    /// Market-cap ranks for the largest coins; one page is enough to break
    /// symbol collisions among anything a user is likely to ask for.
    async fn fetch_ranks(&self) -> Result<HashMap<String, u32>> {
        let url = self.url(
            "coins/markets",
            &[
                ("vs_currency", "usd".into()),
                ("order", "market_cap_desc".into()),
                ("per_page", RANKED_PAGE_SIZE.to_string()),
                ("page", "1".into()),
                ("sparkline", "false".into()),
            ],
        )?;
        let entries: Vec<MarketsEntry> = self.get_json(&url, Resource::Market("coin ranks")).await?;

        Ok(entries
            .into_iter()
            .filter_map(|e| e.market_cap_rank.map(|rank| (e.id, rank)))
            .collect())
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn coin_list(&self) -> Result<Vec<CoinListing>> {
        let url = self.url("coins/list", &[])?;
        let entries: Vec<CoinListEntry> = self.get_json(&url, Resource::Market("coin list")).await?;
        if entries.is_empty() {
            return Err(AnalystError::upstream("coin list is empty"));
        }

        let ranks = match self.fetch_ranks().await {
            Ok(ranks) => ranks,
            Err(e) => {
                tracing::warn!(error = %e, "Rank metadata unavailable, resolving without it");
                HashMap::new()
            }
        };

        let listings = convert_coin_list(entries, &ranks);
        tracing::info!(coins = listings.len(), ranked = ranks.len(), "Loaded coin list");
        Ok(listings)
    }

    async fn fetch_current(&self, coin: &CanonicalCoin) -> Result<MarketSnapshot> {
        let url = self.url(
            &format!("coins/{}", coin.id),
            &[
                ("localization", "false".into()),
                ("tickers", "false".into()),
                ("market_data", "true".into()),
                ("community_data", "false".into()),
                ("developer_data", "false".into()),
                ("sparkline", "false".into()),
            ],
        )?;
        let detail: CoinDetail = self.get_json(&url, Resource::Coin(&coin.id)).await?;
        convert_snapshot(coin, detail)
    }

    async fn fetch_history(
        &self,
        coin: &CanonicalCoin,
        timeframe: Timeframe,
    ) -> Result<HistoricalSeries> {
        let mut params = vec![
            ("vs_currency", "usd".to_string()),
            ("days", timeframe.days().to_string()),
        ];
        if let Some(interval) = timeframe.interval() {
            params.push(("interval", interval.to_string()));
        }

        let url = self.url(&format!("coins/{}/market_chart", coin.id), &params)?;
        let chart: MarketChart = self.get_json(&url, Resource::Coin(&coin.id)).await?;
        let series = convert_history(timeframe, chart)?;

        tracing::debug!(coin = %coin.id, %timeframe, points = series.len(), "Fetched history");
        Ok(series)
    }

    async fn fetch_global(&self) -> Result<GlobalMarketContext> {
        let url = self.url("global", &[])?;
        let envelope: GlobalEnvelope = self.get_json(&url, Resource::Market("global market data")).await?;
        convert_global(envelope)
    }

    async fn fetch_trending(&self) -> Result<Vec<TrendingCoin>> {
        let url = self.url("search/trending", &[])?;
        let envelope: TrendingEnvelope = self.get_json(&url, Resource::Market("trending coins")).await?;
        Ok(convert_trending(envelope))
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

fn check_status(response: &HttpResponse, resource: Resource<'_>) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let detail = error_detail(&response.body);
    let label = resource.label();
    match response.status {
        429 => Err(AnalystError::RateLimited {
            service: SERVICE.into(),
            retry_after: response.retry_after,
        }),
        401 | 403 => Err(AnalystError::Auth(format!(
            "{SERVICE} rejected the request (HTTP {}): {detail}",
            response.status
        ))),
        404 => match resource {
            Resource::Coin(id) => Err(AnalystError::NotFound(id.to_string())),
            Resource::Market(_) => Err(AnalystError::upstream(format!(
                "{SERVICE} endpoint for {label} not found (HTTP 404): {detail}"
            ))),
        },
        status @ 500..=599 => Err(AnalystError::transient(format!(
            "{SERVICE} HTTP {status} for {label}: {detail}"
        ))),
        status => Err(AnalystError::upstream(format!(
            "{SERVICE} HTTP {status} for {label}: {detail}"
        ))),
    }
}

/// Best-effort error text from a CoinGecko error body
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        status: Option<ErrorStatus>,
    }

    #[derive(Deserialize)]
    struct ErrorStatus {
        error_message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or_else(|| b.status.and_then(|s| s.error_message)))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
    name: String,
}

#[derive(Deserialize)]
struct MarketsEntry {
    id: String,
    market_cap_rank: Option<u32>,
}

#[derive(Deserialize)]
struct UsdValue {
    usd: Option<f64>,
}

#[derive(Deserialize)]
struct UsdDate {
    usd: Option<String>,
}

#[derive(Deserialize)]
struct CoinDetail {
    id: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    market_cap_rank: Option<u32>,
    market_data: Option<MarketDataWire>,
}

#[derive(Deserialize)]
struct MarketDataWire {
    current_price: Option<UsdValue>,
    market_cap: Option<UsdValue>,
    market_cap_rank: Option<u32>,
    fully_diluted_valuation: Option<UsdValue>,
    total_volume: Option<UsdValue>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    max_supply: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    price_change_percentage_7d: Option<f64>,
    price_change_percentage_30d: Option<f64>,
    price_change_percentage_1y: Option<f64>,
    ath: Option<UsdValue>,
    ath_date: Option<UsdDate>,
    atl: Option<UsdValue>,
    atl_date: Option<UsdDate>,
    last_updated: Option<String>,
}

/// `[timestamp_ms, value]` pairs; values may be null
type ChartPairs = Vec<(f64, Option<f64>)>;

#[derive(Deserialize)]
struct MarketChart {
    prices: Option<ChartPairs>,
    #[serde(default)]
    total_volumes: ChartPairs,
    #[serde(default)]
    market_caps: ChartPairs,
}

#[derive(Deserialize)]
struct GlobalEnvelope {
    data: Option<GlobalWire>,
}

#[derive(Deserialize)]
struct GlobalWire {
    total_market_cap: Option<HashMap<String, f64>>,
    total_volume: Option<HashMap<String, f64>>,
    market_cap_percentage: Option<HashMap<String, f64>>,
    active_cryptocurrencies: Option<u64>,
    markets: Option<u64>,
    market_cap_change_percentage_24h_usd: Option<f64>,
    /// Unix seconds
    updated_at: Option<i64>,
}

#[derive(Deserialize)]
struct TrendingEnvelope {
    #[serde(default)]
    coins: Vec<TrendingWrapper>,
}

#[derive(Deserialize)]
struct TrendingWrapper {
    item: TrendingItem,
}

#[derive(Deserialize)]
struct TrendingItem {
    id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<u32>,
    price_btc: Option<f64>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn convert_coin_list(entries: Vec<CoinListEntry>, ranks: &HashMap<String, u32>) -> Vec<CoinListing> {
    entries
        .into_iter()
        .map(|e| {
            let rank = ranks.get(&e.id).copied();
            let listing = CoinListing::new(e.id, e.symbol, e.name);
            match rank {
                Some(rank) => listing.with_rank(rank),
                None => listing,
            }
        })
        .collect()
}

fn usd(value: Option<&UsdValue>, dp: u32) -> Option<rust_decimal::Decimal> {
    value.and_then(|v| v.usd).and_then(|v| decimal_from_f64(v, dp))
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn convert_snapshot(requested: &CanonicalCoin, detail: CoinDetail) -> Result<MarketSnapshot> {
    let md = detail.market_data.ok_or_else(|| {
        AnalystError::upstream(format!("no market_data in response for {}", requested.id))
    })?;

    let coin = CanonicalCoin::new(
        detail.id.unwrap_or_else(|| requested.id.clone()),
        detail.name.unwrap_or_else(|| requested.name.clone()),
        detail.symbol.unwrap_or_else(|| requested.symbol.clone()),
    );
    let pct = |v: Option<f64>| v.and_then(|v| decimal_from_f64(v, PERCENT_DP));
    let amount = |v: Option<f64>| v.and_then(|v| decimal_from_f64(v, PRICE_DP));

    Ok(MarketSnapshot {
        coin,
        current_price: usd(md.current_price.as_ref(), PRICE_DP),
        market_cap: usd(md.market_cap.as_ref(), AMOUNT_DP),
        market_cap_rank: detail.market_cap_rank.or(md.market_cap_rank),
        fully_diluted_valuation: usd(md.fully_diluted_valuation.as_ref(), AMOUNT_DP),
        total_volume_24h: usd(md.total_volume.as_ref(), AMOUNT_DP),
        circulating_supply: amount(md.circulating_supply),
        total_supply: amount(md.total_supply),
        max_supply: amount(md.max_supply),
        price_change_24h: pct(md.price_change_percentage_24h),
        price_change_7d: pct(md.price_change_percentage_7d),
        price_change_30d: pct(md.price_change_percentage_30d),
        price_change_1y: pct(md.price_change_percentage_1y),
        ath: usd(md.ath.as_ref(), PRICE_DP),
        ath_date: parse_timestamp(md.ath_date.as_ref().and_then(|d| d.usd.as_deref())),
        atl: usd(md.atl.as_ref(), PRICE_DP),
        atl_date: parse_timestamp(md.atl_date.as_ref().and_then(|d| d.usd.as_deref())),
        last_updated: parse_timestamp(md.last_updated.as_deref()),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn convert_history(timeframe: Timeframe, chart: MarketChart) -> Result<HistoricalSeries> {
    let prices = chart
        .prices
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AnalystError::upstream("market chart contains no prices"))?;

    // Volumes and market caps are aligned with prices by index
    let side_value = |pairs: &ChartPairs, i: usize| {
        pairs
            .get(i)
            .and_then(|(_, v)| *v)
            .and_then(|v| decimal_from_f64(v, AMOUNT_DP))
    };

    let points = prices
        .iter()
        .enumerate()
        .filter_map(|(i, (ts, price))| {
            let timestamp = ts.round() as i64;
            Some(PricePoint {
                timestamp,
                date: datetime_from_millis(timestamp)?,
                price: decimal_from_f64((*price)?, PRICE_DP)?,
                volume: side_value(&chart.total_volumes, i),
                market_cap: side_value(&chart.market_caps, i),
            })
        })
        .collect::<Vec<_>>();

    if points.is_empty() {
        return Err(AnalystError::upstream("market chart contains no usable prices"));
    }

    Ok(HistoricalSeries::new(timeframe, points))
}

fn convert_global(envelope: GlobalEnvelope) -> Result<GlobalMarketContext> {
    let data = envelope
        .data
        .ok_or_else(|| AnalystError::upstream("no data in global market response"))?;

    let pick = |map: &Option<HashMap<String, f64>>, key: &str, dp: u32| {
        map.as_ref()
            .and_then(|m| m.get(key).copied())
            .and_then(|v| decimal_from_f64(v, dp))
    };

    Ok(GlobalMarketContext {
        total_market_cap_usd: pick(&data.total_market_cap, "usd", AMOUNT_DP),
        total_volume_24h_usd: pick(&data.total_volume, "usd", AMOUNT_DP),
        btc_dominance: pick(&data.market_cap_percentage, "btc", PERCENT_DP),
        eth_dominance: pick(&data.market_cap_percentage, "eth", PERCENT_DP),
        active_cryptocurrencies: data.active_cryptocurrencies,
        markets: data.markets,
        market_cap_change_24h: data
            .market_cap_change_percentage_24h_usd
            .and_then(|v| decimal_from_f64(v, PERCENT_DP)),
        updated_at: data
            .updated_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
}

fn convert_trending(envelope: TrendingEnvelope) -> Vec<TrendingCoin> {
    envelope
        .coins
        .into_iter()
        .take(MAX_TRENDING)
        .map(|w| TrendingCoin {
            id: w.item.id,
            name: w.item.name,
            symbol: w.item.symbol,
            market_cap_rank: w.item.market_cap_rank,
            price_btc: w.item.price_btc.and_then(|v| decimal_from_f64(v, 12)),
        })
        .collect()
}
