//! Retrieval-augmented answering for Postop.
//!
//! ```text
//! question ──► Retriever ──► Prompt ──► LlmProvider ──► Answer (with context)
//!    └───────────────────────────────► LlmProvider ──► Answer (plain)
//! ```
//!
//! An [`AnswerPipeline`] can only be built from a ready
//! `Arc<VectorIndex>`, so no question is answered before index startup has
//! finished.

pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use pipeline::{Answer, AnswerPipeline, AnswerSettings, BothAnswers};
pub use prompt::{PROMPT_TEMPLATE, Prompt, assemble};
pub use retriever::{DEFAULT_TOP_K, RetrievalResult, Retriever};
