//! The answer pipeline: plain and context-grounded answers to a question.

use crate::prompt::assemble;
use crate::retriever::{DEFAULT_TOP_K, Retriever};
use postop_core::{Error, Result};
use postop_llm::{
    CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, LlmProvider, TokenUsage,
};
use postop_vector::{SearchHit, VectorIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Generation and retrieval knobs for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSettings {
    /// Pages retrieved for the with-context answer.
    pub top_k: usize,

    /// Sampling temperature passed to the model.
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            temperature: Some(0.7),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// A generated answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The question as asked.
    pub question: String,

    /// Generated text.
    pub text: String,

    /// Pages the answer was grounded on; empty for plain answers.
    pub sources: Vec<SearchHit>,

    /// Tokens consumed by the generation call.
    pub usage: TokenUsage,
}

/// Both answers to one question, each succeeding or failing on its own.
#[derive(Debug)]
pub struct BothAnswers {
    /// Answer straight from the model.
    pub plain: Result<Answer>,

    /// Answer grounded on retrieved pages.
    pub with_context: Result<Answer>,
}

/// Answers questions with and without retrieved context.
///
/// Holds only shared, read-only state, so one pipeline can serve many
/// questions concurrently.
pub struct AnswerPipeline {
    retriever: Retriever,
    llm: Arc<dyn LlmProvider>,
    settings: AnswerSettings,
}

impl AnswerPipeline {
    /// Create a pipeline over a ready index.
    pub fn new(
        index: Arc<VectorIndex>,
        llm: Arc<dyn LlmProvider>,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            retriever: Retriever::new(index, settings.top_k),
            llm,
            settings,
        }
    }

    /// Pipeline settings.
    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    /// The retriever used for context-grounded answers.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    fn request(&self, content: String) -> CompletionRequest {
        let request = CompletionRequest::user(content).with_max_tokens(self.settings.max_tokens);
        match self.settings.temperature {
            Some(t) => request.with_temperature(t),
            None => request,
        }
    }

    async fn generate(&self, content: String) -> Result<CompletionResponse> {
        let request = self.request(content);
        log::debug!(
            "Sending {} prompt chars to {} ({})",
            request.prompt_chars(),
            self.llm.name(),
            self.llm.model()
        );
        let response = self.llm.complete(request).await?;
        if response.is_truncated() {
            log::warn!(
                "Answer hit the {}-token limit and may be cut off",
                self.settings.max_tokens
            );
        }
        Ok(response)
    }

    /// Send the question to the model as-is, with no retrieval.
    pub async fn answer_plain(&self, question: &str) -> Result<Answer> {
        let question = validate(question)?;
        let response = self.generate(question.to_string()).await?;
        Ok(Answer {
            question: question.to_string(),
            text: response.content,
            sources: Vec::new(),
            usage: response.tokens_used,
        })
    }

    /// Retrieve relevant pages, build the prompt, and generate.
    pub async fn answer_with_context(&self, question: &str) -> Result<Answer> {
        let question = validate(question)?;

        let context = self.retriever.retrieve(question).await?;
        let prompt = assemble(question, &context);
        if !prompt.has_context() {
            log::warn!("No page text retrieved; answering from an empty context");
        }
        log::debug!("Answering with {} page(s) of context", context.len());

        let response = self.generate(prompt.render()).await?;
        Ok(Answer {
            question: question.to_string(),
            text: response.content,
            sources: context.hits,
            usage: response.tokens_used,
        })
    }

    /// Produce both answers concurrently.
    pub async fn answer_both(&self, question: &str) -> BothAnswers {
        let (plain, with_context) = tokio::join!(
            self.answer_plain(question),
            self.answer_with_context(question)
        );
        BothAnswers {
            plain,
            with_context,
        }
    }
}

fn validate(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("question must not be empty"));
    }
    Ok(trimmed)
}
