use serde::{Deserialize, Serialize};

/// Which of the two TTS wire protocols to speak (spec §9 open question:
/// the source has a blocking synthesize-then-stream path and a fully
/// streaming token-in path; both honor §4.6's mute-and-close interrupt
/// semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtsVendor {
    Streaming,
    OpenaiBlocking,
}

impl Default for TtsVendor {
    fn default() -> Self {
        TtsVendor::Streaming
    }
}

/// TTS Streamer configuration (spec §4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// `TTS_VENDOR ∈ {openai-blocking, streaming}`.
    #[serde(default)]
    pub vendor: TtsVendor,
    /// API credential sent in the beginning-of-stream message.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "d_stream_url")]
    pub stream_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_voice")]
    pub voice: String,
    #[serde(default = "d_speed")]
    pub speed: f32,
    #[serde(default = "d_stability")]
    pub stability: f32,
    #[serde(default = "d_similarity")]
    pub similarity: f32,
    /// Silence duration after a flush that declares the turn complete
    /// when the upstream `isFinal` signal never arrives (spec §4.6,
    /// `TTS_FLUSH_QUIET_MS`).
    #[serde(default = "d_flush_quiet_ms")]
    pub flush_quiet_ms: u64,
    /// Every Nth outbound frame is followed by a `mark` event (spec
    /// §4.6). `N = 10` in spec.md; exposed here per §9's note that the
    /// rollback-style constants may be tunable.
    #[serde(default = "d_mark_every")]
    pub mark_every: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            vendor: TtsVendor::default(),
            api_key: String::new(),
            stream_url: d_stream_url(),
            model: d_model(),
            voice: d_voice(),
            speed: d_speed(),
            stability: d_stability(),
            similarity: d_similarity(),
            flush_quiet_ms: d_flush_quiet_ms(),
            mark_every: d_mark_every(),
        }
    }
}

fn d_stream_url() -> String {
    "wss://tts.example.com/v1/stream".into()
}
fn d_model() -> String {
    "tts-1".into()
}
fn d_voice() -> String {
    "alloy".into()
}
fn d_speed() -> f32 {
    1.0
}
fn d_stability() -> f32 {
    0.5
}
fn d_similarity() -> f32 {
    0.75
}
fn d_flush_quiet_ms() -> u64 {
    500
}
fn d_mark_every() -> u32 {
    10
}
