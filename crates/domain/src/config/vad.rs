use serde::{Deserialize, Serialize};

/// VAD Gate configuration (spec §4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Silence-hangover before an utterance is considered ended
    /// (`VAD_SILENCE_MS`, default 800). The primary latency knob.
    #[serde(default = "d_silence_ms")]
    pub silence_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            silence_ms: d_silence_ms(),
        }
    }
}

fn d_silence_ms() -> u64 {
    800
}
