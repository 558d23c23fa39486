//! Prompt assembly.
//!
//! The retrieved page texts are joined, in retrieval order, into a single
//! context block and interpolated with the question into a fixed template.
//! The rendered prompt is sent to the model as one user message.

use crate::retriever::RetrievalResult;

/// Template for context-grounded answers.
///
/// `{question}` and `{context}` are replaced at render time.
pub const PROMPT_TEMPLATE: &str = "You are a helpful assistant, you answer user queries related to \
post surgery care and other physiotherapy questions using the provided context only. \
If the context is empty or does not contain the answer, say that the provided guides do not cover it.

Question:
{question}

Context:
{context}

Answer:";

/// Separator between page texts in the context block.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// A question paired with its context block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    question: String,
    context: String,
}

impl Prompt {
    /// Create a prompt from a question and a ready context block.
    pub fn new(question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
        }
    }

    /// The user's question.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The context block.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Whether any context was retrieved.
    pub fn has_context(&self) -> bool {
        !self.context.trim().is_empty()
    }

    /// The final prompt text.
    pub fn render(&self) -> String {
        // Context first: page text may itself contain "{question}".
        PROMPT_TEMPLATE
            .replacen("{context}", &self.context, 1)
            .replacen("{question}", &self.question, 1)
    }
}

/// Build the prompt for `question` from retrieved pages.
pub fn assemble(question: &str, context: &RetrievalResult) -> Prompt {
    let block = context
        .units()
        .map(|unit| unit.text.trim())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    Prompt::new(question, block)
}
