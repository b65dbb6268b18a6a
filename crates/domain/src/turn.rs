use serde::Serialize;

use crate::cancel::CancelToken;
use crate::clock::MonotonicMs;

/// Lifecycle phase of one user→AI exchange (spec §3/§4.7's state diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Capturing,
    Transcribing,
    Generating,
    Speaking,
    Committing,
    Interrupted,
}

/// The four wall-clock checkpoints the Latency Tracker reads (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct Timings {
    pub vad_end: Option<MonotonicMs>,
    pub llm_call: Option<MonotonicMs>,
    pub llm_first_token: Option<MonotonicMs>,
    pub tts_first_chunk: Option<MonotonicMs>,
}

impl Timings {
    /// Four deltas emitted on turn completion (spec §4.8). `None` when
    /// either endpoint of a delta was never recorded (e.g. the turn
    /// never reached `speaking`).
    pub fn deltas(&self) -> LatencyDeltas {
        LatencyDeltas {
            vad_end_to_llm_call: sub(self.llm_call, self.vad_end),
            llm_call_to_first_token: sub(self.llm_first_token, self.llm_call),
            first_token_to_tts_first_chunk: sub(self.tts_first_chunk, self.llm_first_token),
            vad_end_to_tts_first_chunk: sub(self.tts_first_chunk, self.vad_end),
        }
    }
}

fn sub(later: Option<MonotonicMs>, earlier: Option<MonotonicMs>) -> Option<u64> {
    match (later, earlier) {
        (Some(l), Some(e)) if l >= e => Some(l - e),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencyDeltas {
    pub vad_end_to_llm_call: Option<u64>,
    pub llm_call_to_first_token: Option<u64>,
    pub first_token_to_tts_first_chunk: Option<u64>,
    pub vad_end_to_tts_first_chunk: Option<u64>,
}

/// Lifecycle record for one user→AI exchange (spec §3 "Turn").
#[derive(Debug, Clone)]
pub struct Turn {
    pub phase: Phase,
    pub pending_assistant_text: String,
    pub was_interrupted: bool,
    pub llm_canceller: CancelToken,
    pub timings: Timings,
    /// Set only when the assistant entry for this turn has been committed
    /// to history; cleared on rollback. Used by the interrupt handler's
    /// race-window check (spec §4.7 step 5, §8 scenario 4).
    pub history_saved_at: Option<MonotonicMs>,
}

impl Turn {
    pub fn new() -> Self {
        Self {
            phase: Phase::Capturing,
            pending_assistant_text: String::new(),
            was_interrupted: false,
            llm_canceller: CancelToken::new(),
            timings: Timings::default(),
            history_saved_at: None,
        }
    }

    /// Invariant 4 (spec §3): an interrupted turn's pending text must
    /// never be committed; an uninterrupted non-empty one must commit
    /// exactly once. Returns the text to commit, if any.
    pub fn committable_text(&self) -> Option<&str> {
        if self.was_interrupted || self.pending_assistant_text.is_empty() {
            None
        } else {
            Some(self.pending_assistant_text.as_str())
        }
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committable_text_is_none_when_interrupted() {
        let mut turn = Turn::new();
        turn.pending_assistant_text = "hello".into();
        turn.was_interrupted = true;
        assert_eq!(turn.committable_text(), None);
    }

    #[test]
    fn committable_text_is_none_when_empty() {
        let turn = Turn::new();
        assert_eq!(turn.committable_text(), None);
    }

    #[test]
    fn committable_text_present_when_clean() {
        let mut turn = Turn::new();
        turn.pending_assistant_text = "hi there".into();
        assert_eq!(turn.committable_text(), Some("hi there"));
    }

    #[test]
    fn deltas_are_none_when_endpoints_missing() {
        let timings = Timings::default();
        let deltas = timings.deltas();
        assert!(deltas.vad_end_to_llm_call.is_none());
    }

    #[test]
    fn deltas_compute_when_both_endpoints_present() {
        let timings = Timings {
            vad_end: Some(100),
            llm_call: Some(120),
            llm_first_token: Some(250),
            tts_first_chunk: Some(400),
        };
        let deltas = timings.deltas();
        assert_eq!(deltas.vad_end_to_llm_call, Some(20));
        assert_eq!(deltas.llm_call_to_first_token, Some(130));
        assert_eq!(deltas.first_token_to_tts_first_chunk, Some(150));
        assert_eq!(deltas.vad_end_to_tts_first_chunk, Some(300));
    }
}
