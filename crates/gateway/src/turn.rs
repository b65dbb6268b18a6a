//! Turn Controller (spec §4.7): the per-call actor that owns a
//! [`Session`] exclusively and drives VAD gating, STT aggregation, LLM
//! streaming, and TTS framing from one sequential event loop — the
//! single-writer discipline spec §5 requires, without locks (spec §9
//! "Per-call actor over callback soup").
//!
//! Collaborators never touch [`Session`] directly: the telephony
//! WebSocket handler, and the STT/LLM/TTS background tasks this actor
//! itself spawns, only ever post an [`ActorEvent`] onto this actor's
//! queue.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Duration;

use dg_domain::cancel::CancelToken;
use dg_domain::clock::{now_ms, MonotonicMs};
use dg_domain::config::Config;
use dg_domain::message::HistoryEntry;
use dg_domain::session::Session;
use dg_domain::stream::LlmEvent;
use dg_domain::telephony::TelephonyOut;
use dg_domain::trace::TraceEvent;
use dg_domain::turn::{Phase, Turn};

use dg_providers::llm::LlmClient;
use dg_providers::stt::{SttClient, SttEvent, SttSession};
use dg_providers::tts::{TtsClient, TtsDownstream, TtsSession};

use dg_sessions::SessionRegistry;

use crate::tts_framer::Framer;
use crate::vad::{self, EnergyVad, GateEvent, GateState, VadClassifier};

/// Events the actor's queue carries. Every one of spec §4.7's named
/// event kinds is represented either directly (`Media`, `Stop`) or
/// folded into the collaborator payload that triggers it (`Stt`
/// carries both `transcript_partial`/`transcript_final`, `Llm` carries
/// `llm_first_token`/`llm_token`/`llm_complete`/`llm_error`, `TtsDown`
/// carries `tts_audio_sent`/`tts_complete`). `interrupt_trigger` and
/// `speech_started`/`speech_ended` are derived inline from `Media`
/// rather than posted separately, since both are pure functions of
/// state this actor already owns.
pub enum ActorEvent {
    Start {
        stream_id: String,
        telephony_out: Arc<dyn TelephonyOut>,
    },
    Media {
        payload: Vec<u8>,
    },
    Stop,
    Stt(SttEvent),
    Llm(LlmEvent),
    TtsDown(TtsDownstream),
    /// Debounce tick for the flush-completion safety timer (spec §4.6),
    /// tagged with the generation it was armed under so a stray tick
    /// from a superseded timer is a no-op.
    FlushQuietTick(u64),
}

pub type CallHandle = mpsc::UnboundedSender<ActorEvent>;

/// Turn-scoped working state that the canonical [`Turn`] record doesn't
/// carry (spec §4.7 names these as Turn Controller closure variables,
/// not `Turn` fields — `lastAudioSentAt`/`ttsPlaying` live on the
/// controller, reset per dispatch).
struct ActiveTurn {
    turn: Turn,
}

/// Spawns one call's actor task and returns its event sender. The
/// caller (the telephony WebSocket handler) is responsible for
/// registering this sender in the [`SessionRegistry`] and feeding it
/// [`ActorEvent::Start`]/[`ActorEvent::Media`]/[`ActorEvent::Stop`].
pub fn spawn(
    call_id: String,
    system_prompt: String,
    config: Arc<Config>,
    stt_client: Arc<dyn SttClient>,
    llm_client: Arc<dyn LlmClient>,
    tts_client: Arc<dyn TtsClient>,
    registry: Arc<SessionRegistry<CallHandle>>,
) -> CallHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let self_tx = tx.clone();
    tokio::spawn(run(
        call_id,
        system_prompt,
        config,
        stt_client,
        llm_client,
        tts_client,
        rx,
        self_tx,
        registry,
    ));
    tx
}

async fn run(
    call_id: String,
    system_prompt: String,
    config: Arc<Config>,
    stt_client: Arc<dyn SttClient>,
    llm_client: Arc<dyn LlmClient>,
    tts_client: Arc<dyn TtsClient>,
    mut rx: mpsc::UnboundedReceiver<ActorEvent>,
    self_tx: CallHandle,
    registry: Arc<SessionRegistry<CallHandle>>,
) {
    let mut actor = Actor::new(
        call_id,
        system_prompt,
        config,
        stt_client,
        llm_client,
        tts_client,
        self_tx,
        registry,
    );
    while let Some(event) = rx.recv().await {
        actor.handle(event).await;
        if actor.terminal {
            break;
        }
    }
}

struct Actor {
    call_id: String,
    config: Arc<Config>,
    session: Session,
    stt_client: Arc<dyn SttClient>,
    llm_client: Arc<dyn LlmClient>,
    tts_client: Arc<dyn TtsClient>,
    registry: Arc<SessionRegistry<CallHandle>>,
    self_tx: CallHandle,
    classifier: Arc<dyn VadClassifier>,
    gate_state: GateState,
    stt_session: Option<Arc<dyn SttSession>>,
    tts_session: Option<Arc<dyn TtsSession>>,
    framer: Framer,
    tts_frame_count: u32,
    /// Set on interrupt; dropped on the next successful `ensureOpen`.
    /// Gates stray downstream events from a connection whose `close()`
    /// is still in flight (spec §4.6 "Interrupt semantics": "guarantees
    /// no further audio reaches the telephony sink even if upstream
    /// frames are still in flight").
    tts_muted: bool,
    /// Persists past the `Some -> None` transition of `active` so the
    /// rollback race window (spec §8 scenario 4) and the barge-in
    /// "recent audio" window (§4.7) both still work for a handful of
    /// milliseconds after a turn has already completed — see DESIGN.md
    /// "barge-in keyed off TTS-activity recency".
    last_audio_sent_at: Option<MonotonicMs>,
    last_history_saved_at: Option<MonotonicMs>,
    tts_playing: bool,
    flush_sent: bool,
    flush_gen: u64,
    active: Option<ActiveTurn>,
    turn_seq: u32,
    terminal: bool,
}

impl Actor {
    fn new(
        call_id: String,
        system_prompt: String,
        config: Arc<Config>,
        stt_client: Arc<dyn SttClient>,
        llm_client: Arc<dyn LlmClient>,
        tts_client: Arc<dyn TtsClient>,
        self_tx: CallHandle,
        registry: Arc<SessionRegistry<CallHandle>>,
    ) -> Self {
        Self {
            session: Session::new(call_id.clone(), system_prompt),
            call_id,
            config,
            stt_client,
            llm_client,
            tts_client,
            registry,
            self_tx,
            classifier: Arc::new(EnergyVad::new()),
            gate_state: GateState::Idle,
            stt_session: None,
            tts_session: None,
            framer: Framer::new(),
            tts_frame_count: 0,
            tts_muted: false,
            last_audio_sent_at: None,
            last_history_saved_at: None,
            tts_playing: false,
            flush_sent: false,
            flush_gen: 0,
            active: None,
            turn_seq: 0,
            terminal: false,
        }
    }

    async fn handle(&mut self, event: ActorEvent) {
        match event {
            ActorEvent::Start {
                stream_id,
                telephony_out,
            } => self.on_start(stream_id, telephony_out).await,
            ActorEvent::Media { payload } => self.on_media(payload).await,
            ActorEvent::Stop => self.on_stop().await,
            ActorEvent::Stt(event) => self.on_stt(event),
            ActorEvent::Llm(event) => self.on_llm(event).await,
            ActorEvent::TtsDown(event) => self.on_tts_down(event).await,
            ActorEvent::FlushQuietTick(gen) => self.on_flush_quiet_tick(gen).await,
        }
    }

    // ── start / teardown ────────────────────────────────────────────

    async fn on_start(&mut self, stream_id: String, telephony_out: Arc<dyn TelephonyOut>) {
        self.session.bind_stream(stream_id, telephony_out);
        TraceEvent::SessionCreated {
            call_id: self.call_id.clone(),
        }
        .emit();

        if !self.open_stt().await {
            tracing::error!(call_id = %self.call_id, "STT connect failed at start, fatal to session");
            self.on_stop().await;
            return;
        }
        if !self.open_tts().await {
            tracing::error!(call_id = %self.call_id, "TTS connect failed at start, fatal to session");
            self.on_stop().await;
            return;
        }

        if !self.session.system_prompt.is_empty() {
            self.start_greeting().await;
        }
    }

    async fn on_stop(&mut self) {
        if !self.session.close() {
            return;
        }
        if let Some(active) = self.active.take() {
            // Lifecycle: "destruction ... finalizes any in-flight Turn
            // as interrupted" — cancel and drop without committing.
            active.turn.llm_canceller.cancel();
        }
        if let Some(stt) = self.stt_session.take() {
            tokio::spawn(async move { stt.close().await });
        }
        if let Some(tts) = self.tts_session.take() {
            tokio::spawn(async move { tts.close().await });
        }
        TraceEvent::SessionClosed {
            call_id: self.call_id.clone(),
            duration_ms: now_ms().saturating_sub(self.session.created_at),
            turn_count: self.turn_seq,
        }
        .emit();
        self.registry
            .close_all(&self.call_id, &self.session.history)
            .await;
        self.terminal = true;
    }

    async fn open_stt(&mut self) -> bool {
        let (tx, mut rx) = mpsc::unbounded_channel::<SttEvent>();
        match self.stt_client.connect(&self.call_id, tx).await {
            Ok(session) => {
                self.stt_session = Some(session);
                let self_tx = self.self_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if self_tx.send(ActorEvent::Stt(event)).is_err() {
                            break;
                        }
                    }
                });
                true
            }
            Err(e) => {
                tracing::error!(call_id = %self.call_id, error = %e, "STT connect failed");
                false
            }
        }
    }

    async fn open_tts(&mut self) -> bool {
        let (tx, mut rx) = mpsc::unbounded_channel::<TtsDownstream>();
        match self.tts_client.connect(tx).await {
            Ok(session) => {
                self.tts_session = Some(session);
                self.tts_muted = false;
                let self_tx = self.self_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if self_tx.send(ActorEvent::TtsDown(event)).is_err() {
                            break;
                        }
                    }
                });
                true
            }
            Err(e) => {
                tracing::error!(call_id = %self.call_id, error = %e, "TTS connect failed");
                false
            }
        }
    }

    // ── greeting / turn dispatch (spec §4.7) ────────────────────────

    async fn start_greeting(&mut self) {
        if self.active.is_some() {
            return;
        }
        let mut turn = Turn::new();
        turn.phase = Phase::Generating;
        turn.timings.vad_end = Some(self.session.created_at);
        let cancel = turn.llm_canceller.clone();
        self.begin_turn(turn);
        self.invoke_llm(String::new(), Vec::new(), cancel).await;
    }

    /// `speech_ended` handler (spec §4.7 "Turn dispatch").
    async fn dispatch_turn(&mut self) {
        // Only a "capturing" (no AI turn live) utterance dispatches.
        // An utterance that ends while a prior turn is still generating
        // or speaking stays buffered for the next dispatch (spec §4.7
        // edge policy: late finals "join the next turn's buffer").
        if self.active.is_some() {
            return;
        }
        let Some(joined) = self.session.take_transcript_buffer() else {
            return;
        };
        self.session.commit_user(joined.clone());
        let vad_end = now_ms();

        if self.tts_session.is_none() {
            if !self.open_tts().await {
                tracing::error!(call_id = %self.call_id, "could not reopen TTS for new turn");
                return;
            }
        }

        let mut turn = Turn::new();
        turn.phase = Phase::Generating;
        turn.timings.vad_end = Some(vad_end);
        let cancel = turn.llm_canceller.clone();
        self.begin_turn(turn);

        let history_excluding_current = {
            let history = &self.session.history;
            history[..history.len().saturating_sub(1)].to_vec()
        };
        self.invoke_llm(joined, history_excluding_current, cancel).await;
    }

    fn begin_turn(&mut self, turn: Turn) {
        self.framer = Framer::new();
        self.tts_frame_count = 0;
        self.tts_muted = false;
        self.flush_sent = false;
        self.flush_gen = self.flush_gen.wrapping_add(1);
        self.turn_seq += 1;
        TraceEvent::TurnStarted {
            call_id: self.call_id.clone(),
            turn_seq: self.turn_seq,
        }
        .emit();
        self.active = Some(ActiveTurn { turn });
    }

    async fn invoke_llm(&mut self, user_message: String, history: Vec<HistoryEntry>, cancel: CancelToken) {
        if let Some(active) = self.active.as_mut() {
            active.turn.timings.llm_call = Some(now_ms());
        }
        let llm_client = self.llm_client.clone();
        let self_tx = self.self_tx.clone();
        let system_prompt = self.session.system_prompt.clone();
        tokio::spawn(async move {
            match llm_client.stream(&system_prompt, &user_message, &history, cancel).await {
                Ok(mut stream) => {
                    while let Some(item) = stream.next().await {
                        let event = match item {
                            Ok(event) => event,
                            Err(e) => LlmEvent::Error {
                                message: e.to_string(),
                                aborted: e.is_aborted(),
                            },
                        };
                        let is_terminal = matches!(event, LlmEvent::Done { .. } | LlmEvent::Error { .. });
                        if self_tx.send(ActorEvent::Llm(event)).is_err() || is_terminal {
                            break;
                        }
                    }
                }
                Err(e) => {
                    let _ = self_tx.send(ActorEvent::Llm(LlmEvent::Error {
                        message: e.to_string(),
                        aborted: false,
                    }));
                }
            }
        });
    }

    // ── media / VAD / barge-in (spec §4.2, §4.3, §4.7) ──────────────

    async fn on_media(&mut self, payload: Vec<u8>) {
        if self.session.is_closed() {
            return;
        }
        let now = now_ms();

        // (a) call-recording fan-out is explicitly out of scope (spec
        // §1); (b) VAD Gate below; (c) STT forwarding follows it.
        let gate_event = vad::step(
            &mut self.gate_state,
            &mut self.session.vad_state.speech_started_at,
            &mut self.session.vad_state.last_voice_at,
            &mut self.session.vad_state.pending_frames,
            &payload,
            self.classifier.as_ref(),
            &self.config.vad,
        );
        self.session.vad_state.is_speaking = matches!(self.gate_state, GateState::Speaking);

        if let GateEvent::SpeechEnded { .. } = gate_event {
            self.dispatch_turn().await;
        }

        if self.session.vad_state.is_speaking {
            if let Some(stt) = self.stt_session.clone() {
                let _ = stt.send_audio(&payload).await;
            }
        }

        self.maybe_barge_in(now).await;
    }

    /// Barge-in detection (spec §4.7): runs on every inbound media
    /// frame while TTS is active. Keyed off TTS-activity recency rather
    /// than strictly `Turn.phase == generating | speaking` — see
    /// DESIGN.md for why this still satisfies the rollback race (spec
    /// §8 scenario 4) and the "uninterruptible once committed and the
    /// window has elapsed" note of §9.
    async fn maybe_barge_in(&mut self, now: MonotonicMs) {
        if !self.session.vad_state.is_speaking {
            return;
        }
        let Some(speech_started_at) = self.session.vad_state.speech_started_at else {
            return;
        };
        let tts_active = self.tts_playing
            || self
                .last_audio_sent_at
                .map(|t| now.saturating_sub(t) < self.config.turn.interrupt_tts_recent_ms)
                .unwrap_or(false);
        if !tts_active {
            return;
        }
        let speaking_duration = now.saturating_sub(speech_started_at);
        let has_transcript = !self.session.transcript_buffer.is_empty();
        let fast_path = speaking_duration > self.config.turn.interrupt_fast_ms && has_transcript;
        let safety_path = speaking_duration > self.config.turn.interrupt_safety_ms;
        if fast_path || safety_path {
            self.interrupt(now).await;
        }
    }

    // ── interrupt handler (spec §4.7, fixed order per §9) ───────────

    async fn interrupt(&mut self, now: MonotonicMs) {
        let had_active = self.active.is_some();
        if let Some(active) = self.active.as_mut() {
            active.turn.was_interrupted = true;
        }

        // 2. clear.
        if let Some(telephony_out) = self.session.telephony_out.clone() {
            let _ = telephony_out.send_clear().await;
        }

        // 3. mute TTS: drop buffer, mark muted, close upstream.
        self.framer = Framer::new();
        self.tts_muted = true;
        if let Some(tts) = self.tts_session.take() {
            tokio::spawn(async move { tts.close().await });
        }

        // 4. cancel LLM.
        if let Some(active) = self.active.as_ref() {
            active.turn.llm_canceller.cancel();
        }

        // 5. rollback, if the just-completed commit is still in the
        // race window (spec §4.7 step 5, §8 scenario 4).
        let mut rolled_back = false;
        if let Some(saved_at) = self.last_history_saved_at {
            if now.saturating_sub(saved_at) < self.config.turn.history_rollback_ms {
                rolled_back = self.session.rollback_last_assistant();
            }
        }

        // 6. clear controller-local state.
        let tts_elapsed_ms = self.last_audio_sent_at.map(|t| now.saturating_sub(t));
        self.last_audio_sent_at = None;
        self.last_history_saved_at = None;
        self.tts_playing = false;
        self.flush_sent = false;
        self.flush_gen = self.flush_gen.wrapping_add(1);

        if let Some(mut active) = self.active.take() {
            active.turn.phase = Phase::Interrupted;
        }

        TraceEvent::InterruptTriggered {
            call_id: self.call_id.clone(),
            phase: if had_active { "active".into() } else { "post-completion".into() },
            tts_elapsed_ms,
            rolled_back,
        }
        .emit();
    }

    // ── STT aggregation (spec §4.4) ─────────────────────────────────

    fn on_stt(&mut self, event: SttEvent) {
        match event {
            SttEvent::Partial { text } => {
                tracing::debug!(call_id = %self.call_id, text = %text, "stt partial");
            }
            SttEvent::Final { text } => {
                self.session.push_transcript_final(text);
            }
        }
    }

    // ── LLM streaming (spec §4.5, §4.7 steps 8) ─────────────────────

    async fn on_llm(&mut self, event: LlmEvent) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match event {
            LlmEvent::Token { text } => {
                if active.turn.timings.llm_first_token.is_none() {
                    active.turn.timings.llm_first_token = Some(now_ms());
                    active.turn.phase = Phase::Speaking;
                }
                if !active.turn.was_interrupted {
                    active.turn.pending_assistant_text.push_str(&text);
                    if let Some(tts) = self.tts_session.clone() {
                        let _ = tts.send_token(&text).await;
                    }
                }
            }
            LlmEvent::Done { full, .. } => {
                active.turn.pending_assistant_text = full;
                let was_interrupted = active.turn.was_interrupted;
                if !was_interrupted {
                    if let Some(tts) = self.tts_session.clone() {
                        let _ = tts.flush().await;
                        self.flush_sent = true;
                        self.start_flush_quiet_timer();
                    }
                }
            }
            LlmEvent::Error { message, aborted } => {
                if aborted {
                    tracing::debug!(call_id = %self.call_id, "llm stream aborted (expected cancellation)");
                } else {
                    tracing::error!(call_id = %self.call_id, error = %message, "llm stream failed");
                }
                // §7: an LLM failure, cancelled or not, never yields a
                // trustworthy completion to commit.
                self.complete_turn(true, "llm-error").await;
            }
        }
    }

    // ── TTS streaming (spec §4.6) ────────────────────────────────────

    async fn on_tts_down(&mut self, event: TtsDownstream) {
        if self.tts_muted {
            return;
        }
        match event {
            TtsDownstream::Audio(bytes) => {
                let frames = self.framer.push(&bytes);
                for frame in frames {
                    self.emit_tts_frame(&frame).await;
                }
                if self.flush_sent {
                    self.start_flush_quiet_timer();
                }
            }
            TtsDownstream::Final => {
                self.complete_turn(false, "tts-final").await;
            }
            TtsDownstream::Error(message) => {
                tracing::error!(call_id = %self.call_id, error = %message, "tts vendor error");
                self.complete_turn(true, "tts-error").await;
            }
        }
    }

    async fn emit_tts_frame(&mut self, frame: &[u8]) {
        let Some(telephony_out) = self.session.telephony_out.clone() else {
            return;
        };
        if telephony_out.send_media(frame).await.is_err() {
            tracing::warn!(call_id = %self.call_id, "telephony writer closed mid-send");
            self.on_stop().await;
            return;
        }
        self.tts_frame_count += 1;
        let now = now_ms();
        self.last_audio_sent_at = Some(now);
        self.tts_playing = true;
        if let Some(active) = self.active.as_mut() {
            if active.turn.timings.tts_first_chunk.is_none() {
                active.turn.timings.tts_first_chunk = Some(now);
            }
        }
        if self.tts_frame_count % self.config.tts.mark_every == 0 {
            let _ = telephony_out
                .send_mark(&format!("frame-{}", self.tts_frame_count))
                .await;
        }
    }

    fn start_flush_quiet_timer(&mut self) {
        self.flush_gen = self.flush_gen.wrapping_add(1);
        let gen = self.flush_gen;
        let ms = self.config.tts.flush_quiet_ms;
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let _ = self_tx.send(ActorEvent::FlushQuietTick(gen));
        });
    }

    async fn on_flush_quiet_tick(&mut self, gen: u64) {
        if gen != self.flush_gen {
            return; // superseded by a newer audio frame or a new turn.
        }
        self.complete_turn(false, "flush-quiet-timeout").await;
    }

    /// Completes the current turn: commits the assistant entry unless
    /// `force_no_commit` or the turn was interrupted (invariant 4),
    /// records the latency deltas, and clears turn-scoped state (spec
    /// §4.8: "cleared on tts_complete or interrupt_trigger").
    async fn complete_turn(&mut self, force_no_commit: bool, reason: &'static str) {
        if self.active.is_none() {
            return;
        }
        // Any sub-frame tail still buffered gets padded and flushed
        // before the turn is declared done (spec §4.6: "any remaining
        // bytes < 160 are padded and flushed first").
        if !self.tts_muted {
            if let Some(frame) = self.framer.flush_padded() {
                self.emit_tts_frame(&frame).await;
            }
        }
        let Some(active) = self.active.take() else {
            return;
        };
        let mut turn = active.turn;
        self.tts_playing = false;

        if !force_no_commit {
            if let Some(text) = turn.committable_text() {
                let text = text.to_string();
                let saved_at = self.session.commit_assistant(text.clone());
                turn.history_saved_at = Some(saved_at);
                self.last_history_saved_at = Some(saved_at);
                TraceEvent::TurnCommitted {
                    call_id: self.call_id.clone(),
                    turn_seq: self.turn_seq,
                    assistant_chars: text.len(),
                }
                .emit();
            } else {
                TraceEvent::TurnDropped {
                    call_id: self.call_id.clone(),
                    turn_seq: self.turn_seq,
                    reason: reason.into(),
                }
                .emit();
            }
        } else {
            TraceEvent::TurnDropped {
                call_id: self.call_id.clone(),
                turn_seq: self.turn_seq,
                reason: reason.into(),
            }
            .emit();
        }

        turn.phase = Phase::Committing;
        let deltas = turn.timings.deltas();
        TraceEvent::LatencyRecorded {
            call_id: self.call_id.clone(),
            vad_end_to_llm_call_ms: deltas.vad_end_to_llm_call,
            llm_call_to_first_token_ms: deltas.llm_call_to_first_token,
            first_token_to_tts_first_chunk_ms: deltas.first_token_to_tts_first_chunk,
            vad_end_to_tts_first_chunk_ms: deltas.vad_end_to_tts_first_chunk,
        }
        .emit();

        self.flush_sent = false;
        self.flush_gen = self.flush_gen.wrapping_add(1);
    }
}
