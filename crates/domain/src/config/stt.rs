use serde::{Deserialize, Serialize};

/// STT Multiplexer configuration (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// `STT_CLIENT_ID` — required; validated at startup.
    #[serde(default)]
    pub client_id: String,
    /// `STT_CLIENT_SECRET` — required; validated at startup.
    #[serde(default)]
    pub client_secret: String,
    /// Auth token endpoint (`POST` form-encoded client_id/client_secret).
    #[serde(default = "d_auth_url")]
    pub auth_url: String,
    /// Streaming WebSocket endpoint.
    #[serde(default = "d_stream_url")]
    pub stream_url: String,
    #[serde(default = "d_true")]
    pub use_itn: bool,
    #[serde(default = "d_true")]
    pub use_disfluency_filter: bool,
    #[serde(default = "d_true")]
    pub use_profanity_filter: bool,
    /// Grace period after the `"EOS"` sentinel before closing the
    /// upstream stream, to let trailing finals arrive (spec §4.4).
    #[serde(default = "d_eos_grace_ms")]
    pub eos_grace_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: d_auth_url(),
            stream_url: d_stream_url(),
            use_itn: true,
            use_disfluency_filter: true,
            use_profanity_filter: true,
            eos_grace_ms: d_eos_grace_ms(),
        }
    }
}

fn d_auth_url() -> String {
    "https://stt.example.com/oauth/token".into()
}
fn d_stream_url() -> String {
    "wss://stt.example.com/v1/stream".into()
}
fn d_true() -> bool {
    true
}
fn d_eos_grace_ms() -> u64 {
    500
}
