//! Coin Resolver
//!
//! Maps a free-form user identifier ("btc", "Bitcoin", "bitcoin") to a
//! canonical coin. The coin list is loaded at most once per resolver and
//! shared by all callers.
//!
//! ## Match order
//!
//! 1. exact id
//! 2. exact symbol
//! 3. exact name
//! 4. name or id containing the input
//!
//! Within a tier the best (lowest) market-cap rank wins, ranked coins beat
//! unranked ones, and remaining ties keep list order.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::{AnalystError, Result};
use crate::market::MarketDataSource;
use crate::model::{CanonicalCoin, CoinListing};

/// Resolves user input against a cached coin list
pub struct CoinResolver {
    source: Arc<dyn MarketDataSource>,
    coins: OnceCell<Arc<Vec<CoinListing>>>,
}

impl std::fmt::Debug for CoinResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinResolver")
            .field("source", &self.source.name())
            .field("cached", &self.coins.get().map(|c| c.len()))
            .finish()
    }
}

impl CoinResolver {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            coins: OnceCell::new(),
        }
    }

    /// Resolve `input` to a canonical coin
    pub async fn resolve(&self, input: &str) -> Result<CanonicalCoin> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Err(AnalystError::InvalidInput("coin identifier is empty".into()));
        }

        let coins = self.coins().await?;
        let found = best_match(&coins, &needle)
            .ok_or_else(|| AnalystError::NotFound(input.trim().to_string()))?;

        tracing::debug!(input = %needle, id = %found.id, "Resolved coin");
        Ok(found.to_canonical())
    }

    /// Cached coin list; a failed load is retried by the next caller
    async fn coins(&self) -> Result<Arc<Vec<CoinListing>>> {
        self.coins
            .get_or_try_init(|| async {
                let list = self.source.coin_list().await?;
                if list.is_empty() {
                    return Err(AnalystError::upstream("coin list is empty"));
                }
                Ok::<_, AnalystError>(Arc::new(list))
            })
            .await
            .cloned()
    }
}

fn best_match<'a>(coins: &'a [CoinListing], needle: &str) -> Option<&'a CoinListing> {
    let tiers: [&dyn Fn(&CoinListing) -> bool; 4] = [
        &|c| c.id.to_lowercase() == needle,
        &|c| c.symbol.to_lowercase() == needle,
        &|c| c.name.to_lowercase() == needle,
        &|c| c.name.to_lowercase().contains(needle) || c.id.to_lowercase().contains(needle),
    ];

    tiers
        .iter()
        .find_map(|matches| best_ranked(coins.iter().filter(|&c| matches(c))))
}

/// Lowest rank wins; unranked sorts last; `min_by_key` keeps the first of equals
fn best_ranked<'a>(candidates: impl Iterator<Item = &'a CoinListing>) -> Option<&'a CoinListing> {
    candidates.min_by_key(|c| c.market_cap_rank.unwrap_or(u32::MAX))
}
