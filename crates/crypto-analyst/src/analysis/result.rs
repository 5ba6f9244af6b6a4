//! Structured trading analysis and the parser that extracts it from model text.
//!
//! Models rarely return clean JSON: they wrap it in code fences, prepend a
//! sentence, or write numbers where strings were asked for. The parser tries
//! progressively looser candidates and the types accept both strings and
//! numbers for free-text fields. Only the section layout, the trend direction
//! and the confidence level are strict.

use std::fmt;

use agent_core::provider::TokenUsage;
use serde::{Deserialize, Serialize};

/// Outcome of one analysis request
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisResult {
    /// Model that produced the text
    pub model: String,

    /// Unmodified model output
    pub raw_text: String,

    pub usage: Option<TokenUsage>,

    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
}

impl AnalysisResult {
    pub fn structured(&self) -> Option<&TradingAnalysis> {
        match &self.outcome {
            AnalysisOutcome::Structured { analysis } => Some(analysis),
            AnalysisOutcome::Unstructured { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        self.structured().is_some()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Structured { analysis: TradingAnalysis },
    /// Output could not be parsed; `raw_text` still holds it
    Unstructured { reason: String },
}

/// Free-text field that also accepts numbers and booleans
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TextRepr", into = "String")]
pub struct Text(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum TextRepr {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<TextRepr> for Text {
    fn from(repr: TextRepr) -> Self {
        Self(match repr {
            TextRepr::Str(s) => s,
            TextRepr::Int(n) => n.to_string(),
            TextRepr::Float(n) => n.to_string(),
            TextRepr::Bool(b) => b.to_string(),
        })
    }
}

impl From<Text> for String {
    fn from(text: Text) -> Self {
        text.0
    }
}

impl Text {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Market trend; parsed case-insensitively
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "Text")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Sideways,
}

impl TryFrom<Text> for TrendDirection {
    type Error = String;

    fn try_from(text: Text) -> Result<Self, Self::Error> {
        match text.0.trim().to_ascii_lowercase().as_str() {
            "bullish" => Ok(TrendDirection::Bullish),
            "bearish" => Ok(TrendDirection::Bearish),
            "sideways" | "neutral" | "ranging" => Ok(TrendDirection::Sideways),
            other => Err(format!("unknown trend direction '{other}'")),
        }
    }
}

/// High/Medium/Low, also accepts a 1-10 score
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "Text")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl TryFrom<Text> for ConfidenceLevel {
    type Error = String;

    fn try_from(text: Text) -> Result<Self, Self::Error> {
        let value = text.0.trim().to_ascii_lowercase();
        match value.as_str() {
            "high" => return Ok(ConfidenceLevel::High),
            "medium" | "moderate" => return Ok(ConfidenceLevel::Medium),
            "low" => return Ok(ConfidenceLevel::Low),
            _ => {}
        }

        let score = value
            .split('/')
            .next()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| format!("unknown confidence level '{value}'"))?;

        Ok(if score >= 7.0 {
            ConfidenceLevel::High
        } else if score >= 4.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradingAnalysis {
    pub market_analysis: MarketAnalysis,
    pub trading_zones: TradingZones,
    pub take_profit_levels: TakeProfitLevels,
    pub stop_loss: StopLoss,
    pub technical_indicators: TechnicalIndicators,
    pub time_horizon: TimeHorizon,
    pub position_sizing: PositionSizing,
    pub risk_warnings: RiskWarnings,
    pub key_insights: KeyInsights,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub current_trend: TrendDirection,
    pub trend_confidence: ConfidenceLevel,
    pub market_phase: Option<Text>,
    pub risk_level: Option<Text>,
    pub liquidity_assessment: Option<Text>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceZone {
    pub price_range: Text,
    pub confidence: Option<Text>,
    pub rationale: Option<Text>,
    pub risk_reward_ratio: Option<Text>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradingZones {
    pub primary_buy_zone: PriceZone,
    pub secondary_buy_zone: Option<PriceZone>,
    pub primary_resistance: Option<PriceZone>,
    pub key_support: Option<Text>,
    pub key_resistance: Option<Text>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TakeProfit {
    pub price: Text,
    pub percentage_gain: Option<Text>,
    pub probability: Option<Text>,
    pub allocation: Option<Text>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TakeProfitLevels {
    pub tp1_conservative: TakeProfit,
    pub tp2_moderate: Option<TakeProfit>,
    pub tp3_aggressive: Option<TakeProfit>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopLevel {
    pub price: Text,
    pub percentage_loss: Option<Text>,
    pub rationale: Option<Text>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopLoss {
    pub conservative_sl: StopLevel,
    pub moderate_sl: Option<StopLevel>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub rsi_14: Option<Text>,
    pub macd_signal: Option<Text>,
    pub volume_trend: Option<Text>,
    pub moving_average_trend: Option<Text>,
    pub support_strength: Option<Text>,
    pub resistance_strength: Option<Text>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeHorizon {
    pub short_term_1_7_days: Option<Text>,
    pub medium_term_1_4_weeks: Option<Text>,
    pub long_term_1_3_months: Option<Text>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PositionSizing {
    pub conservative_trader: Option<Text>,
    pub moderate_trader: Option<Text>,
    pub aggressive_trader: Option<Text>,
    pub maximum_risk: Option<Text>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RiskWarnings {
    #[serde(default)]
    pub high_risk_factors: Vec<Text>,
    pub market_conditions_impact: Option<Text>,
    pub volatility_alert: Option<Text>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scenarios {
    pub bull_case: Option<Text>,
    pub bear_case: Option<Text>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeyInsights {
    pub market_context: Option<Text>,
    #[serde(default)]
    pub price_catalysts: Vec<Text>,
    pub alternative_scenarios: Option<Scenarios>,
}

impl TradingAnalysis {
    /// Price levels must carry text; the rest is optional commentary
    fn validate(&self) -> Result<(), String> {
        let required = [
            ("trading_zones.primary_buy_zone.price_range", &self.trading_zones.primary_buy_zone.price_range),
            ("take_profit_levels.tp1_conservative.price", &self.take_profit_levels.tp1_conservative.price),
            ("stop_loss.conservative_sl.price", &self.stop_loss.conservative_sl.price),
        ];

        match required.iter().find(|(_, text)| text.is_blank()) {
            Some((field, _)) => Err(format!("{field} is empty")),
            None => Ok(()),
        }
    }
}

/// Extract a `TradingAnalysis` from model output.
///
/// Candidates, first success wins: the whole text, the first fenced code
/// block, then the slice from the first `{` to the last `}`. The error is the
/// reason the last candidate was rejected.
pub fn parse_analysis(raw: &str) -> Result<TradingAnalysis, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("model returned an empty response".into());
    }

    let mut candidates: Vec<&str> = vec![trimmed];
    for candidate in [fenced_block(trimmed), brace_slice(trimmed)].into_iter().flatten() {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    let mut reason = String::from("no JSON object found in model output");
    for candidate in candidates {
        match serde_json::from_str::<TradingAnalysis>(candidate) {
            Ok(analysis) => match analysis.validate() {
                Ok(()) => return Ok(analysis),
                Err(e) => reason = format!("invalid analysis: {e}"),
            },
            Err(e) if candidate.starts_with('{') => reason = format!("invalid analysis JSON: {e}"),
            Err(_) => {}
        }
    }

    Err(reason)
}

/// Body of the first ``` fence, with an optional `json` language tag
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim()).filter(|s| !s.is_empty())
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
pub(crate) const SAMPLE_ANALYSIS: &str = r#"{
  "market_analysis": {
    "current_trend": "Bullish",
    "trend_confidence": "High",
    "market_phase": "Markup",
    "risk_level": "Medium",
    "liquidity_assessment": "High"
  },
  "trading_zones": {
    "primary_buy_zone": {"price_range": "$92,000 - $94,500", "confidence": 8, "rationale": "Prior breakout retest", "risk_reward_ratio": "1:3"},
    "secondary_buy_zone": {"price_range": "$88,000 - $90,000", "confidence": "6", "rationale": "Weekly support"},
    "primary_resistance": {"price_range": "$102,000 - $105,000", "confidence": "7", "rationale": "Round number and ATH zone"},
    "key_support": "$91,800",
    "key_resistance": 104000
  },
  "take_profit_levels": {
    "tp1_conservative": {"price": "$101,000", "percentage_gain": "3.6%", "probability": "70%", "allocation": "40% of position"},
    "tp2_moderate": {"price": "$106,000", "percentage_gain": "8.7%", "probability": "45%", "allocation": "35% of position"},
    "tp3_aggressive": {"price": "$115,000", "percentage_gain": "17.9%", "probability": "20%", "allocation": "25% of position"}
  },
  "stop_loss": {
    "conservative_sl": {"price": "$89,500", "percentage_loss": "8.2%", "rationale": "Below secondary support"},
    "moderate_sl": {"price": "$86,000", "percentage_loss": "11.8%", "rationale": "Below monthly range"}
  },
  "technical_indicators": {
    "rsi_14": "62 - Neutral",
    "macd_signal": "Bullish",
    "volume_trend": "Increasing",
    "moving_average_trend": "Bullish",
    "support_strength": "Strong",
    "resistance_strength": "Moderate"
  },
  "time_horizon": {
    "short_term_1_7_days": "Consolidation between $94k and $100k",
    "medium_term_1_4_weeks": "Retest of $105k likely",
    "long_term_1_3_months": "Trend intact above $88k"
  },
  "position_sizing": {
    "conservative_trader": "2% of portfolio",
    "moderate_trader": "5% of portfolio",
    "aggressive_trader": "10% of portfolio",
    "maximum_risk": "Never exceed 15% of total portfolio"
  },
  "risk_warnings": {
    "high_risk_factors": ["Macro data releases", "ETF outflows", "Leverage build-up"],
    "market_conditions_impact": "Risk-on sentiment supports majors",
    "volatility_alert": "Expect +/- 6% swings"
  },
  "key_insights": {
    "market_context": "BTC dominance above 56% favours bitcoin over altcoins",
    "price_catalysts": ["Spot ETF inflows", "Halving supply shock"],
    "alternative_scenarios": {
      "bull_case": "Break above $105k targets $115k",
      "bear_case": "Loss of $88k opens $80k"
    }
  }
}"#;
