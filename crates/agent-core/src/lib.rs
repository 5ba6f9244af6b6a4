//! # agent-core
//!
//! Provider-agnostic LLM abstraction used by the market analyst.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │  Analysis Requester  │────▶│     LlmProvider      │
//! │  (crypto-analyst)    │     │     (Strategy)       │
//! └──────────────────────┘     └──────────┬───────────┘
//!                                         │
//!                          ┌──────────────┴─────────────┐
//!                          │  GroqProvider (runtime)    │
//!                          │  test doubles              │
//!                          └────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping completion backends without
//! changing analysis logic.

pub mod error;
pub mod message;
pub mod provider;

pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
