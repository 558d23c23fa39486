//! The generation seam: one trait, plus the request and response shapes
//! every backend speaks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use postop_core::Result;

/// Output budget used when a request does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// A backend that turns a prompt into generated text.
///
/// Implementations must be shareable across tasks; the answer pipeline
/// issues plain and context-grounded calls concurrently.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion to the end.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short backend label, e.g. `"openai"`.
    fn name(&self) -> &str;

    /// Model identifier sent to the backend.
    fn model(&self) -> &str;
}

/// Everything a backend needs for one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Instructions sent ahead of the conversation.
    pub system_prompt: Option<String>,

    /// Conversation turns, oldest first.
    pub messages: Vec<Message>,

    /// Output budget.
    pub max_tokens: u32,

    /// Sampling temperature; `None` leaves the backend default.
    pub temperature: Option<f32>,

    /// Strings that end generation early.
    pub stop_sequences: Vec<String>,
}

impl CompletionRequest {
    /// Request over the given turns with no system prompt.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system_prompt: None,
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            stop_sequences: Vec::new(),
        }
    }

    /// Request made of a single user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(vec![Message::user(content)])
    }

    /// Builder: system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Builder: output budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder: sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builder: one more stop sequence.
    pub fn with_stop_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.stop_sequences.push(sequence.into());
        self
    }

    /// Characters of prompt text, system prompt included.
    pub fn prompt_chars(&self) -> usize {
        let system = self.system_prompt.as_deref().map_or(0, str::len);
        system + self.messages.iter().map(|m| m.content.len()).sum::<usize>()
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the turn.
    pub role: Role,

    /// Turn text.
    pub content: String,
}

impl Message {
    /// A turn written by the person asking.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A turn written by the model.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Author of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,
    /// The model.
    Assistant,
}

/// What a backend returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text.
    pub content: String,

    /// Billing counters reported by the backend.
    pub tokens_used: TokenUsage,

    /// How generation ended.
    pub stop_reason: StopReason,
}

impl CompletionResponse {
    /// Whether the text was cut off by the output budget.
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}

/// Token counters for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,

    /// Generated tokens.
    pub output: u64,
}

impl TokenUsage {
    /// Prompt plus generated tokens.
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// How generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished on its own.
    EndTurn,

    /// The output budget ran out.
    MaxTokens,

    /// A configured stop sequence was produced.
    StopSequence,

    /// The backend withheld output.
    ContentFilter,
}
