//! Runtime Configuration
//!
//! Typed settings read from the environment (a `.env` file is loaded by the
//! binary before any of these run). Every value has a default so the
//! analyst works against the public CoinGecko tier with no setup.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use agent_core::provider::{GenerationOptions, DEFAULT_MODEL};

use crate::error::AnalystError;
use crate::retry::RetryPolicy;

pub const PUBLIC_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// CoinGecko API plan, selects the key header and default base URL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApiTier {
    #[default]
    Demo,
    Pro,
}

impl ApiTier {
    pub fn key_header(self) -> &'static str {
        match self {
            ApiTier::Demo => "x-cg-demo-api-key",
            ApiTier::Pro => "x-cg-pro-api-key",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiTier::Demo => PUBLIC_BASE_URL,
            ApiTier::Pro => PRO_BASE_URL,
        }
    }
}

impl FromStr for ApiTier {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" | "public" | "" => Ok(ApiTier::Demo),
            "pro" => Ok(ApiTier::Pro),
            other => Err(AnalystError::Config(format!(
                "COINGECKO_API_TIER must be 'demo' or 'pro', got '{other}'"
            ))),
        }
    }
}

/// CoinGecko client settings
#[derive(Clone, Debug)]
pub struct CoinGeckoConfig {
    pub base_url: String,

    /// Optional API key sent in the tier's header
    pub api_key: Option<String>,

    pub tier: ApiTier,

    /// Minimum gap between two requests (public tier: ~10-30 calls/min)
    pub request_spacing: Duration,

    /// Per-request network timeout
    pub timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: PUBLIC_BASE_URL.into(),
            api_key: None,
            tier: ApiTier::Demo,
            request_spacing: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl CoinGeckoConfig {
    pub fn from_env() -> Result<Self, AnalystError> {
        Self::from_lookup(env_lookup)
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AnalystError> {
        let defaults = Self::default();

        let tier = lookup("COINGECKO_API_TIER")
            .map(|t| t.parse::<ApiTier>())
            .transpose()?
            .unwrap_or_default();

        let base_url = lookup("COINGECKO_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .map_or_else(|| tier.default_base_url().to_string(), |u| u.trim().to_string());

        let request_spacing = parse_number::<u64>(&lookup, "REQUEST_SPACING_MS")?
            .map_or(defaults.request_spacing, Duration::from_millis);

        let timeout = parse_number::<u64>(&lookup, "HTTP_TIMEOUT_SECS")?
            .map_or(defaults.timeout, Duration::from_secs);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: non_empty(lookup("COINGECKO_API_KEY")),
            tier,
            request_spacing,
            timeout,
            retry: defaults.retry,
        })
    }

    /// No spacing and no retries, for offline tests
    pub fn immediate(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_spacing: Duration::ZERO,
            retry: RetryPolicy::no_retry(),
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_spacing(mut self, spacing: Duration) -> Self {
        self.request_spacing = spacing;
        self
    }

    /// Header carrying the API key, if one is configured
    pub fn auth_header(&self) -> Option<(&'static str, &str)> {
        self.api_key
            .as_deref()
            .map(|key| (self.tier.key_header(), key))
    }
}

/// LLM analysis settings
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub model: String,
    pub temperature: f32,

    /// Request a JSON-object response from the provider
    pub json_mode: bool,

    /// Write `prompt.txt` / `response.txt` for every analysis
    pub debug: bool,
    pub debug_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: 0.3,
            json_mode: true,
            debug: false,
            debug_dir: PathBuf::from("."),
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self, AnalystError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AnalystError> {
        let defaults = Self::default();

        let temperature = parse_number::<f32>(&lookup, "LLM_TEMPERATURE")?
            .unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(AnalystError::Config(format!(
                "LLM_TEMPERATURE must be between 0 and 2, got {temperature}"
            )));
        }

        Ok(Self {
            model: non_empty(lookup("LLM_MODEL")).unwrap_or(defaults.model),
            temperature,
            json_mode: lookup("LLM_JSON_MODE").map_or(defaults.json_mode, |v| is_truthy(&v)),
            debug: lookup("DEBUG").is_some_and(|v| is_truthy(&v)),
            debug_dir: non_empty(lookup("DEBUG_DIR")).map_or(defaults.debug_dir, PathBuf::from),
        })
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::default()
            .with_model(&self.model)
            .with_temperature(self.temperature)
            .with_json_mode(self.json_mode)
    }

    /// Directory for debug artifacts, only when debugging is on
    pub fn debug_dir(&self) -> Option<&Path> {
        self.debug.then_some(self.debug_dir.as_path())
    }
}

/// Which market-data backend to wire up
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarketSourceKind {
    #[default]
    CoinGecko,
    /// Static offline data
    Mock,
}

impl FromStr for MarketSourceKind {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coingecko" | "" => Ok(MarketSourceKind::CoinGecko),
            "mock" => Ok(MarketSourceKind::Mock),
            other => Err(AnalystError::Config(format!(
                "MARKET_DATA_SOURCE must be 'coingecko' or 'mock', got '{other}'"
            ))),
        }
    }
}

/// Complete analyst configuration
#[derive(Clone, Debug, Default)]
pub struct AnalystConfig {
    pub market_source: MarketSourceKind,
    pub coingecko: CoinGeckoConfig,
    pub analysis: AnalysisConfig,
}

impl AnalystConfig {
    pub fn from_env() -> Result<Self, AnalystError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AnalystError> {
        Ok(Self {
            market_source: lookup("MARKET_DATA_SOURCE")
                .map(|s| s.parse::<MarketSourceKind>())
                .transpose()?
                .unwrap_or_default(),
            coingecko: CoinGeckoConfig::from_lookup(&lookup)?,
            analysis: AnalysisConfig::from_lookup(&lookup)?,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AnalystError> {
    match non_empty(lookup(key)) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AnalystError::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}
