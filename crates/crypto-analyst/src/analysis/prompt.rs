//! Prompt text for market analysis.

use crate::error::Result;
use crate::model::AnalysisRequest;

/// System instruction sent ahead of every analysis
pub const SYSTEM_PROMPT: &str = "You are a cryptocurrency market analyst specialised in technical \
analysis, market structure and risk management. You reply with a single JSON object and nothing \
else: no markdown, no code fences, no commentary.";

const DATA_PLACEHOLDER: &str = "{market_data}";

const ANALYSIS_TEMPLATE: &str = r#"Analyse the market data below and produce trading guidance.

Market data (JSON):
{market_data}

Reply with exactly one JSON object using this layout. Replace every placeholder
with a concrete value derived from the data:

{
  "market_analysis": {
    "current_trend": "Bullish | Bearish | Sideways",
    "trend_confidence": "High | Medium | Low",
    "market_phase": "Accumulation | Markup | Distribution | Decline",
    "risk_level": "Low | Medium | High",
    "liquidity_assessment": "High | Medium | Low"
  },
  "trading_zones": {
    "primary_buy_zone": {"price_range": "$low - $high", "confidence": "1-10", "rationale": "...", "risk_reward_ratio": "1:X"},
    "secondary_buy_zone": {"price_range": "$low - $high", "confidence": "1-10", "rationale": "...", "risk_reward_ratio": "1:X"},
    "primary_resistance": {"price_range": "$low - $high", "confidence": "1-10", "rationale": "..."},
    "key_support": "$price",
    "key_resistance": "$price"
  },
  "take_profit_levels": {
    "tp1_conservative": {"price": "$price", "percentage_gain": "X%", "probability": "X%", "allocation": "X% of position"},
    "tp2_moderate": {"price": "$price", "percentage_gain": "X%", "probability": "X%", "allocation": "X% of position"},
    "tp3_aggressive": {"price": "$price", "percentage_gain": "X%", "probability": "X%", "allocation": "X% of position"}
  },
  "stop_loss": {
    "conservative_sl": {"price": "$price", "percentage_loss": "X%", "rationale": "..."},
    "moderate_sl": {"price": "$price", "percentage_loss": "X%", "rationale": "..."}
  },
  "technical_indicators": {
    "rsi_14": "value and Overbought | Oversold | Neutral",
    "macd_signal": "Bullish | Bearish | Neutral",
    "volume_trend": "Increasing | Decreasing | Stable",
    "moving_average_trend": "Bullish | Bearish | Neutral",
    "support_strength": "Strong | Moderate | Weak",
    "resistance_strength": "Strong | Moderate | Weak"
  },
  "time_horizon": {
    "short_term_1_7_days": "outlook with price levels",
    "medium_term_1_4_weeks": "outlook with price levels",
    "long_term_1_3_months": "outlook with price levels"
  },
  "position_sizing": {
    "conservative_trader": "X% of portfolio",
    "moderate_trader": "X% of portfolio",
    "aggressive_trader": "X% of portfolio",
    "maximum_risk": "never exceed X% of portfolio"
  },
  "risk_warnings": {
    "high_risk_factors": ["..."],
    "market_conditions_impact": "...",
    "volatility_alert": "expected swing range"
  },
  "key_insights": {
    "market_context": "...",
    "price_catalysts": ["..."],
    "alternative_scenarios": {"bull_case": "...", "bear_case": "..."}
  }
}

Guidelines:
- Use only the supplied data. Derive indicators from the price history where possible.
- Weigh market-cap rank and 24h volume when judging volatility and liquidity.
- For altcoins, take bitcoin dominance and the global market trend into account.
- Every price level needs a technical justification and a confidence score.
- Always include position sizing and stop losses."#;

/// Render the user prompt with the request embedded as pretty JSON
pub fn render(request: &AnalysisRequest<'_>) -> Result<String> {
    let data = serde_json::to_string_pretty(request)?;
    Ok(ANALYSIS_TEMPLATE.replacen(DATA_PLACEHOLDER, &data, 1))
}
