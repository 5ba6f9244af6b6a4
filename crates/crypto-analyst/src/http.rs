//! HTTP Transport
//!
//! Thin seam between the market-data client and the network so status
//! handling, retries and spacing can be exercised without a live API.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AnalystError;

/// Outgoing GET request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header (seconds form only)
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level failure (no HTTP status was received)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Connect(String),
    Other(String),
}

impl From<TransportError> for AnalystError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => AnalystError::Timeout(msg),
            TransportError::Connect(msg) => AnalystError::transient(format!("connection failed: {msg}")),
            TransportError::Other(msg) => AnalystError::transient(format!("request failed: {msg}")),
        }
    }
}

/// Transport contract used by API clients
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(concat!("crypto-analyst/", env!("CARGO_PKG_VERSION")))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Other(format!("failed to read response body: {e}"))
            }
        })?;

        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_are_lowercased() {
        let request = HttpRequest::get("https://example.test/coins/list")
            .with_header("X-CG-Demo-API-Key", "demo");

        assert_eq!(
            request.headers,
            vec![("x-cg-demo-api-key".to_string(), "demo".to_string())]
        );
    }

    #[test]
    fn test_transport_error_mapping() {
        let err: AnalystError = TransportError::Timeout("elapsed".into()).into();
        assert!(matches!(err, AnalystError::Timeout(_)));

        let err: AnalystError = TransportError::Connect("refused".into()).into();
        assert!(matches!(err, AnalystError::Upstream { transient: true, .. }));
    }

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(429, "").is_success());
    }
}
