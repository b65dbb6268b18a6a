use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM and TTS streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted by an [`LlmClient`](crate::llm::LlmClient) stream.
///
/// Mirrors the spec's `onFirstToken` / `onToken` / `onComplete` / `onError`
/// callback quartet as a single event enum consumed by the Turn Controller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LlmEvent {
    /// A text token chunk, in arrival order.
    #[serde(rename = "token")]
    Token { text: String },

    /// Stream finished cleanly. `full` is the complete accumulated text.
    #[serde(rename = "done")]
    Done {
        full: String,
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// Failure or cooperative cancellation. `aborted` distinguishes an
    /// expected `llmCancel` fire from a genuine upstream error.
    #[serde(rename = "error")]
    Error { message: String, aborted: bool },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
