//! LLM Streamer (spec §4.5): an OpenAI-compatible chat-completions SSE
//! client, grounded in the teacher's streaming adapter shape
//! (`sse::sse_response_stream` + a provider-specific `data:` parser) but
//! generalized to spec.md's abstract contract — `stream(system, user,
//! history, cancel) -> Stream<Item = Result<LlmEvent>>` — rather than the
//! teacher's tool-calling `ChatRequest`/`ChatResponse` pair. No
//! tool-calling loop is implemented: spec.md's LLM contract is plain
//! token streaming.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dg_domain::cancel::CancelToken;
use dg_domain::config::LlmConfig;
use dg_domain::error::{Error, Result};
use dg_domain::message::{HistoryEntry, Message};
use dg_domain::stream::{BoxStream, LlmEvent};

use crate::sse::sse_response_stream;

/// Trait every LLM adapter implements (spec §4.5).
///
/// `history` is the ordered `(role, content)` list the Turn Controller
/// has already assembled (system prompt + committed turns); `user` is
/// the current utterance's text, which may be empty for the initial
/// greeting turn (spec §4.7 "Initial greeting path").
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn stream(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[HistoryEntry],
        cancel: CancelToken,
    ) -> Result<BoxStream<'static, Result<LlmEvent>>>;
}

/// Default implementation: any OpenAI-compatible `/chat/completions`
/// endpoint with `stream: true` (spec §4.5: "any provider with this
/// contract is acceptable").
pub struct OpenAiCompatLlm {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiCompatLlm {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                config.connect_timeout_ms * 6,
            ))
            .connect_timeout(std::time::Duration::from_millis(
                config.connect_timeout_ms,
            ))
            .build()
            .map_err(|e| Error::llm(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl LlmClient for OpenAiCompatLlm {
    async fn stream(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[HistoryEntry],
        cancel: CancelToken,
    ) -> Result<BoxStream<'static, Result<LlmEvent>>> {
        let messages = dg_domain::message::to_llm_messages(system_prompt, history, user_message);
        let wire_messages: Vec<WireMessage> = messages
            .into_iter()
            .map(|m: Message| WireMessage {
                role: match m.role {
                    dg_domain::message::Role::System => "system",
                    dg_domain::message::Role::User => "user",
                    dg_domain::message::Role::Assistant => "assistant",
                },
                content: m.content,
            })
            .collect();

        let body = ChatCompletionsRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            stream: true,
            messages: wire_messages,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!("{status}: {text}")));
        }

        let full = Arc::new(parking_lot::Mutex::new(String::new()));
        let full_for_parser = full.clone();

        let parser = move |data: &str| -> Vec<Result<LlmEvent>> {
            if cancel.is_cancelled() {
                return vec![Err(Error::Aborted)];
            }
            if data == "[DONE]" {
                let full = std::mem::take(&mut *full_for_parser.lock());
                return vec![Ok(LlmEvent::Done {
                    full,
                    usage: None,
                    finish_reason: Some("stop".into()),
                })];
            }
            let chunk: Chunk = match serde_json::from_str(data) {
                Ok(c) => c,
                Err(e) => return vec![Err(Error::llm(format!("malformed chunk: {e}")))],
            };

            let mut events = Vec::new();
            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.clone().filter(|t| !t.is_empty()) {
                    full_for_parser.lock().push_str(&text);
                    events.push(Ok(LlmEvent::Token { text }));
                }
                if choice.finish_reason.is_some() {
                    let full = full_for_parser.lock().clone();
                    events.push(Ok(LlmEvent::Done {
                        full,
                        usage: chunk.usage.as_ref().map(|u| dg_domain::stream::Usage {
                            prompt_tokens: u.prompt_tokens,
                            completion_tokens: u.completion_tokens,
                            total_tokens: u.total_tokens,
                        }),
                        finish_reason: choice.finish_reason.clone(),
                    }));
                }
            }
            events
        };

        Ok(sse_response_stream(response, parser))
    }
}
