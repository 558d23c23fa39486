//! Language model clients for Postop.
//!
//! Everything that turns a prompt into generated text goes through the
//! [`LlmProvider`] trait, so the answer pipeline never depends on a specific
//! vendor API.
//!
//! - [`OpenAiProvider`]: OpenAI chat completions (default `gpt-4`)
//! - [`ClaudeProvider`]: Anthropic messages API
//! - [`MockLlmProvider`]: scripted responses for tests and offline runs
//! - [`RetryWrapper`]: exponential backoff around any provider

mod claude;
mod mock;
mod openai;
mod provider;
mod retry;

pub use claude::ClaudeProvider;
pub use mock::MockLlmProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, LlmProvider, Message, Role,
    StopReason, TokenUsage,
};
pub use retry::RetryWrapper;
