//! # agent-runtime
//!
//! Runtime providers for the crypto market analyst.
//!
//! ## Providers
//!
//! - **Groq** (default): hosted inference via the OpenAI-compatible API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::groq::GroqProvider;
//!
//! let provider = GroqProvider::from_env()?;
//! let completion = provider.complete(&messages, &options).await?;
//! ```

#[cfg(feature = "groq")]
pub mod groq;

#[cfg(feature = "groq")]
pub use groq::{GroqConfig, GroqProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, GenerationOptions, LlmProvider, Message, Result, Role};
