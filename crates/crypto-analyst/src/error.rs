//! Error Types for the Market Analyst

use std::time::Duration;

use agent_core::AgentError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalystError>;

#[derive(Error, Debug)]
pub enum AnalystError {
    #[error("Coin not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        /// Connection failures and 5xx responses; eligible for one retry
        transient: bool,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error kind callers can branch on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    RateLimited,
    Upstream,
    Timeout,
    Auth,
    Internal,
}

impl AnalystError {
    /// Non-retryable upstream failure (bad status, malformed payload)
    pub fn upstream(message: impl Into<String>) -> Self {
        AnalystError::Upstream {
            message: message.into(),
            transient: false,
        }
    }

    /// Upstream failure that may clear up on a second attempt
    pub fn transient(message: impl Into<String>) -> Self {
        AnalystError::Upstream {
            message: message.into(),
            transient: true,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalystError::NotFound(_) => ErrorKind::NotFound,
            AnalystError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalystError::RateLimited { .. } => ErrorKind::RateLimited,
            AnalystError::Upstream { .. } => ErrorKind::Upstream,
            AnalystError::Timeout(_) => ErrorKind::Timeout,
            AnalystError::Auth(_) => ErrorKind::Auth,
            AnalystError::Config(_) | AnalystError::Io(_) | AnalystError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Check if error is retryable at all (the attempt budget lives in `RetryPolicy`)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalystError::RateLimited { .. }
                | AnalystError::Timeout(_)
                | AnalystError::Upstream { transient: true, .. }
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AnalystError::NotFound(coin) => format!(
                "Could not find coin '{coin}'. Try the exact name or symbol (e.g. 'bitcoin', 'btc')."
            ),
            AnalystError::InvalidInput(msg) => format!("Invalid request: {msg}"),
            AnalystError::RateLimited { service, .. } => {
                format!("{service} is rate limiting requests. Please wait a minute and retry.")
            }
            AnalystError::Upstream { .. } => "A data provider returned an unexpected response.".into(),
            AnalystError::Timeout(_) => "A data provider did not respond in time.".into(),
            AnalystError::Auth(_) => "Authentication failed. Please check your API keys.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<AgentError> for AnalystError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Auth(msg) => AnalystError::Auth(msg),
            AgentError::RateLimited(_) => AnalystError::RateLimited {
                service: "LLM provider".into(),
                retry_after: None,
            },
            AgentError::Timeout(msg) => AnalystError::Timeout(msg),
            AgentError::Config(msg) => AnalystError::Config(msg),
            AgentError::ProviderUnavailable(msg) => AnalystError::transient(msg),
            other => AnalystError::upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AnalystError::transient("connection reset").is_retryable());
        assert!(!AnalystError::upstream("HTTP 400").is_retryable());
        assert!(AnalystError::Timeout("coins/list".into()).is_retryable());
        assert!(!AnalystError::NotFound("zzz".into()).is_retryable());
        assert!(!AnalystError::Auth("no key".into()).is_retryable());
    }

    #[test]
    fn test_agent_error_mapping() {
        let err: AnalystError = AgentError::Auth("Invalid API Key".into()).into();
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err: AnalystError = AgentError::Provider("HTTP 400".into()).into();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(!err.is_retryable());

        let err: AnalystError = AgentError::RateLimited("429".into()).into();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
    }
}
