use serde::{Deserialize, Serialize};

/// Turn Controller tunables (spec §4.7 barge-in formula, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Fast barge-in path: speaking this long *with* a non-empty
    /// transcript buffer fires an interrupt (`INTERRUPT_FAST_MS`).
    #[serde(default = "d_interrupt_fast_ms")]
    pub interrupt_fast_ms: u64,
    /// Safety-net barge-in path: speaking this long regardless of STT
    /// output fires an interrupt (`INTERRUPT_SAFETY_MS`).
    #[serde(default = "d_interrupt_safety_ms")]
    pub interrupt_safety_ms: u64,
    /// "TTS-active" window: audio sent within this many ms counts as
    /// still playing for barge-in purposes (`INTERRUPT_TTS_RECENT_MS`).
    #[serde(default = "d_interrupt_tts_recent_ms")]
    pub interrupt_tts_recent_ms: u64,
    /// History-rollback race window (spec §4.7 step 5, §9 "chosen
    /// empirically ... may expose it as a tunable" — resolved here).
    #[serde(default = "d_history_rollback_ms")]
    pub history_rollback_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            interrupt_fast_ms: d_interrupt_fast_ms(),
            interrupt_safety_ms: d_interrupt_safety_ms(),
            interrupt_tts_recent_ms: d_interrupt_tts_recent_ms(),
            history_rollback_ms: d_history_rollback_ms(),
        }
    }
}

fn d_interrupt_fast_ms() -> u64 {
    500
}
fn d_interrupt_safety_ms() -> u64 {
    1500
}
fn d_interrupt_tts_recent_ms() -> u64 {
    2000
}
fn d_history_rollback_ms() -> u64 {
    2000
}
