//! Upstream clients for the three external collaborators (spec §4.4,
//! §4.5, §4.6): STT, LLM, and TTS. Each module owns the wire-level
//! connection only; per-call fan-out, gating, and framing live in the
//! gateway crate.

pub mod llm;
pub mod stt;
pub mod tts;
pub(crate) mod sse;

pub use llm::{LlmClient, OpenAiCompatLlm};
pub use stt::{SttClient, SttEvent, SttSession, WsSttClient};
pub use tts::{BlockingTts, StreamingTts, TtsClient, TtsDownstream, TtsSession};
