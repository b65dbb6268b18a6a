use serde::{Deserialize, Serialize};

/// LLM Streamer configuration (spec §4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `LLM_API_KEY` — required; validated at startup.
    #[serde(default)]
    pub api_key: String,
    /// Chat-completions endpoint. Any OpenAI-compatible provider works
    /// (spec §4.5: "any provider with this contract is acceptable").
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Connect timeout for the streaming HTTP call (spec §5 timeouts).
    #[serde(default = "d_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: d_base_url(),
            model: d_model(),
            temperature: d_temperature(),
            connect_timeout_ms: d_connect_timeout_ms(),
        }
    }
}

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_temperature() -> f32 {
    0.7
}
fn d_connect_timeout_ms() -> u64 {
    10_000
}
