use serde::Serialize;

/// Structured trace events emitted across the dialogue pipeline crates.
///
/// Each variant is a point the Latency Tracker or an operator dashboard
/// cares about; emitting via [`TraceEvent::emit`] keeps the shape stable
/// even as call sites move.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        call_id: String,
    },
    SessionClosed {
        call_id: String,
        duration_ms: u64,
        turn_count: u32,
    },
    TurnStarted {
        call_id: String,
        turn_seq: u32,
    },
    TurnCommitted {
        call_id: String,
        turn_seq: u32,
        assistant_chars: usize,
    },
    TurnDropped {
        call_id: String,
        turn_seq: u32,
        reason: String,
    },
    InterruptTriggered {
        call_id: String,
        phase: String,
        tts_elapsed_ms: Option<u64>,
        rolled_back: bool,
    },
    LatencyRecorded {
        call_id: String,
        vad_end_to_llm_call_ms: Option<u64>,
        llm_call_to_first_token_ms: Option<u64>,
        first_token_to_tts_first_chunk_ms: Option<u64>,
        vad_end_to_tts_first_chunk_ms: Option<u64>,
    },
    ProviderRequest {
        provider: String,
        call_id: String,
        duration_ms: u64,
        success: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "dialogue_event");
    }
}
