//! Mock LLM provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::provider::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};
use postop_core::{Error, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail { message: String, retryable: bool },
}

/// Mock LLM provider that returns scripted responses.
///
/// Useful for testing without making actual API calls. Every request is
/// recorded and can be inspected with [`requests`](Self::requests).
#[derive(Clone)]
pub struct MockLlmProvider {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    script: Vec<Reply>,
    index: usize,
    repeat_last: bool,
    requests: Vec<CompletionRequest>,
}

impl MockLlmProvider {
    fn from_script(script: Vec<Reply>, repeat_last: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                script,
                index: 0,
                repeat_last,
                requests: Vec::new(),
            })),
        }
    }

    /// Creates a new mock provider with canned responses.
    ///
    /// Responses are returned in order. After all responses are used,
    /// the provider cycles back to the first response.
    ///
    /// # Examples
    ///
    /// ```
    /// use postop_llm::MockLlmProvider;
    ///
    /// let provider = MockLlmProvider::new(vec![
    ///     "First response".to_string(),
    ///     "Second response".to_string(),
    /// ]);
    /// ```
    pub fn new(responses: Vec<String>) -> Self {
        Self::from_script(responses.into_iter().map(Reply::Text).collect(), false)
    }

    /// Creates a mock provider with a single response.
    pub fn with_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Creates a provider whose every call fails with a non-retryable error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_script(
            vec![Reply::Fail {
                message: message.into(),
                retryable: false,
            }],
            false,
        )
    }

    /// Creates a provider that fails `failures` times with a retryable
    /// error, then answers with `response` from then on.
    pub fn flaky(failures: usize, response: impl Into<String>) -> Self {
        let mut script: Vec<Reply> = (0..failures)
            .map(|i| Reply::Fail {
                message: format!("transient failure {}", i + 1),
                retryable: true,
            })
            .collect();
        script.push(Reply::Text(response.into()));
        Self::from_script(script, true)
    }

    /// Requests received so far, in order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.state.lock().await.requests.clone()
    }

    /// Number of calls made so far.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.requests.len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut state = self.state.lock().await;
        state.requests.push(request);

        if state.script.is_empty() {
            return Err(Error::generation("Mock provider has no scripted responses"));
        }

        let reply = state.script[state.index].clone();
        if state.index + 1 < state.script.len() {
            state.index += 1;
        } else if !state.repeat_last {
            state.index = 0;
        }

        match reply {
            Reply::Text(content) => Ok(CompletionResponse {
                content,
                tokens_used: TokenUsage {
                    input: 10,
                    output: 20,
                },
                stop_reason: StopReason::EndTurn,
            }),
            Reply::Fail { message, retryable } => Err(if retryable {
                Error::generation_transient(message)
            } else {
                Error::generation(message)
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }
}
