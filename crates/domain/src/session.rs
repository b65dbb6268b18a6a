use std::collections::VecDeque;
use std::sync::Arc;

use crate::clock::{now_ms, MonotonicMs};
use crate::message::HistoryEntry;
use crate::telephony::TelephonyOut;

/// VAD Gate state carried on the [`Session`] (spec §3 `vadState`).
#[derive(Debug, Default)]
pub struct VadState {
    pub is_speaking: bool,
    pub speech_started_at: Option<MonotonicMs>,
    pub last_voice_at: Option<MonotonicMs>,
    /// µ-law frames accumulated since the last `speech_started`, forwarded
    /// to STT and discarded on `speech_ended` (spec §4.3).
    pub pending_frames: VecDeque<Vec<u8>>,
}

impl VadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all in-flight utterance state without touching
    /// `is_speaking`, used when an utterance is consumed by a turn.
    pub fn clear_pending(&mut self) {
        self.speech_started_at = None;
        self.last_voice_at = None;
        self.pending_frames.clear();
    }
}

/// One active call (spec §3 "Session"). Owned exclusively by its
/// per-call actor task; never shared behind a lock (spec §5's
/// single-writer discipline) — only the
/// [`SessionRegistry`](crate::session::Session) map that holds the
/// handle to reach that task needs one.
pub struct Session {
    pub call_id: String,
    pub stream_id: Option<String>,
    pub telephony_out: Option<Arc<dyn TelephonyOut>>,
    /// Invariant 5 (spec §3): never ends with two consecutive assistant
    /// entries.
    pub history: Vec<HistoryEntry>,
    pub system_prompt: String,
    pub vad_state: VadState,
    /// Finalized STT segments since the last `speech_started`. Invariant
    /// 3: empty whenever the turn phase is `idle`.
    pub transcript_buffer: Vec<String>,
    pub created_at: MonotonicMs,
    closed: bool,
}

// spec §3 also names `turn` as a Session field. The actor that owns a
// Session is the only thing that ever touches the in-flight Turn, so it
// keeps that record itself (`gateway::turn::ActiveTurn`) rather than
// duplicating it here — see DESIGN.md "current-turn ownership".

impl Session {
    pub fn new(call_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            stream_id: None,
            telephony_out: None,
            history: Vec::new(),
            system_prompt: system_prompt.into(),
            vad_state: VadState::new(),
            transcript_buffer: Vec::new(),
            created_at: now_ms(),
            closed: false,
        }
    }

    /// Binds the telephony stream identity learned from the `start`
    /// event (spec §4.2).
    pub fn bind_stream(&mut self, stream_id: impl Into<String>, out: Arc<dyn TelephonyOut>) {
        self.stream_id = Some(stream_id.into());
        self.telephony_out = Some(out);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Idempotent terminal transition (spec §4.1 `closeAll`). Returns
    /// `true` the first time it is called for this session, `false` on
    /// every subsequent call — callers use this to decide whether to
    /// run the one-shot teardown hooks.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        true
    }

    /// Appends a non-empty finalized STT segment to the current
    /// utterance's buffer (spec §4.4 "Aggregation").
    pub fn push_transcript_final(&mut self, text: String) {
        if !text.is_empty() {
            self.transcript_buffer.push(text);
        }
    }

    /// Joins and clears the transcript buffer, as done on turn dispatch
    /// (spec §4.7 step 2). Returns `None` if nothing was buffered.
    pub fn take_transcript_buffer(&mut self) -> Option<String> {
        if self.transcript_buffer.is_empty() {
            return None;
        }
        let joined = self.transcript_buffer.join(" ");
        self.transcript_buffer.clear();
        Some(joined)
    }

    /// Appends a committed user entry to history (spec §4.7 step 2).
    pub fn commit_user(&mut self, text: impl Into<String>) {
        self.history.push(HistoryEntry::user(text));
    }

    /// Appends a committed assistant entry, enforcing invariant 5: never
    /// two consecutive assistant entries. In debug builds this is a hard
    /// assertion; in release it logs and skips (spec §7 "Invariant
    /// violation" policy).
    pub fn commit_assistant(&mut self, text: impl Into<String>) -> MonotonicMs {
        let text = text.into();
        if self.history.last().map(HistoryEntry::is_assistant).unwrap_or(false) {
            debug_assert!(false, "double-commit: consecutive assistant history entries");
            tracing::error!(call_id = %self.call_id, "skipped consecutive-assistant history commit");
            return now_ms();
        }
        self.history.push(HistoryEntry::assistant(text));
        now_ms()
    }

    /// Removes the tail history entry if (and only if) it is an
    /// assistant entry (spec §4.7 interrupt handler step 5, §3
    /// invariant 5).
    pub fn rollback_last_assistant(&mut self) -> bool {
        if self.history.last().map(HistoryEntry::is_assistant).unwrap_or(false) {
            self.history.pop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let mut session = Session::new("call-1", "be helpful");
        assert!(session.close());
        assert!(!session.close());
        assert!(session.is_closed());
    }

    #[test]
    fn transcript_buffer_joins_and_clears() {
        let mut session = Session::new("call-1", "be helpful");
        session.push_transcript_final("hello".into());
        session.push_transcript_final("there".into());
        assert_eq!(session.take_transcript_buffer(), Some("hello there".into()));
        assert_eq!(session.take_transcript_buffer(), None);
    }

    #[test]
    fn empty_transcript_segments_are_dropped() {
        let mut session = Session::new("call-1", "be helpful");
        session.push_transcript_final(String::new());
        assert_eq!(session.take_transcript_buffer(), None);
    }

    #[test]
    fn commit_assistant_rejects_consecutive() {
        let mut session = Session::new("call-1", "be helpful");
        session.commit_assistant("first");
        session.commit_assistant("second");
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].text, "first");
    }

    #[test]
    fn rollback_removes_tail_assistant_only() {
        let mut session = Session::new("call-1", "be helpful");
        session.commit_user("hi");
        session.commit_assistant("hello there");
        assert!(session.rollback_last_assistant());
        assert_eq!(session.history.len(), 1);
        assert!(!session.rollback_last_assistant());
    }
}
