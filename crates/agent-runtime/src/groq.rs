//! Groq LLM Provider
//!
//! Implementation of `LlmProvider` for Groq's OpenAI-compatible chat
//! completions API.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, TokenUsage,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Groq provider configuration
#[derive(Clone, Debug)]
pub struct GroqConfig {
    /// API base URL (OpenAI-compatible root)
    pub base_url: String,

    /// API key; `None` means the provider cannot be built
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl GroqConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; malformed values are configuration errors
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let present = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = match present("LLM_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(AgentError::Config(format!(
                        "LLM_TIMEOUT_SECS must be a positive number of seconds, got '{raw}'"
                    )));
                }
            },
            None => defaults.timeout_secs,
        };

        Ok(Self {
            base_url: present("GROQ_BASE_URL").unwrap_or(defaults.base_url),
            api_key: present("GROQ_API_KEY"),
            timeout_secs,
        })
    }

    /// Whether credentials are present
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Groq LLM provider
pub struct GroqProvider {
    client: reqwest::Client,
    config: GroqConfig,
    api_key: String,
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl GroqProvider {
    /// Create from configuration.
    ///
    /// Fails with [`AgentError::Auth`] when no API key is configured, so a
    /// missing credential is caught before any request is made.
    pub fn from_config(config: GroqConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AgentError::Auth("GROQ_API_KEY not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GroqConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Convert prompt messages to wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect()
    }

    /// Build the chat completion request body
    fn build_request<'a>(messages: &'a [Message], opts: &'a GenerationOptions) -> ChatRequest<'a> {
        ChatRequest {
            model: &opts.model,
            messages: Self::convert_messages(messages),
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
            top_p: opts.top_p,
            stop: &opts.stop_sequences,
            response_format: opts.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        }
    }

    /// Convert the wire response to a completion
    fn convert_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Parse("completion carried no choices".into()))?;

        let finish_reason = choice.finish_reason.as_deref().map(FinishReason::from_wire);

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            truncated: finish_reason == Some(FinishReason::Length),
            finish_reason,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_transport_error)?;

        if !(200..300).contains(&status) {
            return Err(map_status(status, &body));
        }

        Ok(body)
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "Groq"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(AgentError::Auth(msg)) => Err(AgentError::Auth(msg)),
            Err(e) => {
                tracing::warn!(error = %e, "Groq health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, options);
        tracing::debug!(model = %options.model, messages = messages.len(), "Sending chat completion");

        let raw = self
            .send(self.client.post(self.endpoint("chat/completions")).json(&body))
            .await?;

        let response: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| AgentError::Parse(format!("malformed completion envelope: {e}")))?;

        let completion = Self::convert_completion(response, &options.model)?;
        tracing::info!(
            model = %completion.model,
            chars = completion.content.len(),
            truncated = completion.truncated,
            "Received completion"
        );
        Ok(completion)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let raw = self.send(self.client.get(self.endpoint("models"))).await?;

        let listing: ModelList = serde_json::from_str(&raw)
            .map_err(|e| AgentError::Parse(format!("malformed model list: {e}")))?;

        Ok(listing
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
                context_length: m.context_window,
            })
            .collect())
    }
}

fn map_transport_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(err.to_string())
    } else if err.is_connect() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

/// Map a non-2xx status to the error taxonomy
fn map_status(status: u16, body: &str) -> AgentError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        401 | 403 => AgentError::Auth(format!("HTTP {status}: {detail}")),
        429 => AgentError::RateLimited(format!("HTTP {status}: {detail}")),
        500..=599 => AgentError::ProviderUnavailable(format!("HTTP {status}: {detail}")),
        _ => AgentError::Provider(format!("HTTP {status}: {detail}")),
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
    #[serde(default)]
    context_window: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GroqConfig::default();
        assert_eq!(config.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.timeout_secs, 120);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = [
            ("GROQ_API_KEY", " gsk_test "),
            ("GROQ_BASE_URL", "http://localhost:8080/v1"),
            ("LLM_TIMEOUT_SECS", "30"),
        ];
        let config = GroqConfig::from_lookup(|key| {
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_string())
        })
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout_secs, 30);

        let empty = GroqConfig::from_lookup(|_| None).unwrap();
        assert_eq!(empty.timeout_secs, 120);
        assert!(!empty.has_credentials());
    }

    #[test]
    fn test_malformed_timeout_is_config_error() {
        for raw in ["soon", "0", "-5"] {
            let err = GroqConfig::from_lookup(|key| {
                (key == "LLM_TIMEOUT_SECS").then(|| raw.to_string())
            })
            .unwrap_err();
            assert!(matches!(err, AgentError::Config(_)), "{raw}");
        }
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let err = GroqProvider::from_config(GroqConfig::default()).unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[test]
    fn test_endpoint_join() {
        let provider = GroqProvider::from_config(GroqConfig {
            base_url: "http://localhost:8080/v1/".into(),
            api_key: Some("gsk_test".into()),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(provider.endpoint("models"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::system("You are an analyst."), Message::user("Data")];
        let opts = GenerationOptions {
            json_mode: true,
            ..GenerationOptions::default()
        };

        let body = serde_json::to_value(GroqProvider::build_request(&messages, &opts)).unwrap();
        assert_eq!(body["model"], "openai/gpt-oss-20b");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Data");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn test_completion_conversion() {
        let raw = r#"{
            "model": "openai/gpt-oss-20b",
            "choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        let completion = GroqProvider::convert_completion(response, "fallback").unwrap();

        assert_eq!(completion.content, "{\"ok\":true}");
        assert_eq!(completion.model, "openai/gpt-oss-20b");
        assert!(completion.truncated);
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = GroqProvider::convert_completion(response, "m").unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"error": {"message": "Invalid API Key"}}"#;
        match map_status(401, body) {
            AgentError::Auth(msg) => assert!(msg.contains("Invalid API Key")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(map_status(429, ""), AgentError::RateLimited(_)));
        assert!(matches!(map_status(503, "down"), AgentError::ProviderUnavailable(_)));
        assert!(matches!(map_status(400, "bad"), AgentError::Provider(_)));
    }
}
