//! Application State

use std::sync::Arc;

use agent_core::LlmProvider;
use crypto_analyst::MarketAnalyst;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Market analyst shared by all requests (coin list cache, request spacing)
    pub analyst: Arc<MarketAnalyst>,
}

impl AppState {
    pub fn new(analyst: MarketAnalyst) -> Self {
        Self {
            analyst: Arc::new(analyst),
        }
    }

    /// LLM provider, if one is configured
    pub fn provider(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.analyst.requester().map(|r| r.provider())
    }
}
