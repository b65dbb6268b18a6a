//! VAD Gate (spec §4.3): µ-law → PCM conversion, an energy-based
//! "very aggressive" voice classifier behind a pluggable trait, and the
//! idle/speaking state machine with configurable silence hangover.
//!
//! Grounded in the energy-threshold fallback of the pack's
//! `VoiceActivityDetector` (RMS over a frame, mapped through a
//! threshold), generalized to the exact five-row transition table
//! spec.md §4.3 names rather than that reference's three-state speech/
//! silence-counter model.

use std::collections::VecDeque;

use dg_domain::clock::{now_ms, MonotonicMs};
use dg_domain::config::VadConfig;

/// 256-entry µ-law → 16-bit linear PCM lookup table, computed once.
/// Standard ITU-T G.711 µ-law decode (the "codec exemption" pure-function
/// path, not a speech-detection model).
pub static MULAW_TO_PCM: [i16; 256] = build_mulaw_table();

const MULAW_BIAS: i32 = 0x84;

const fn build_mulaw_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_mulaw_byte(i as u8);
        i += 1;
    }
    table
}

const fn decode_mulaw_byte(byte: u8) -> i16 {
    let byte = !byte;
    let sign = (byte & 0x80) != 0;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = byte & 0x0F;
    let mut magnitude = ((mantissa as i32) << 3) + MULAW_BIAS;
    magnitude <<= exponent as i32;
    magnitude -= MULAW_BIAS;
    let sample = if sign { -magnitude } else { magnitude };
    sample as i16
}

/// Decode a µ-law frame to 16-bit linear PCM via [`MULAW_TO_PCM`].
pub fn mulaw_to_pcm(frame: &[u8]) -> Vec<i16> {
    frame.iter().map(|&b| MULAW_TO_PCM[b as usize]).collect()
}

/// Voice-activity classification for one frame (spec §4.3: "yields
/// VOICE | SILENCE | ERROR").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Voice,
    Silence,
    Error,
}

/// Pluggable classifier seam (spec §9: the energy-based "very
/// aggressive" mode today, a neural model without touching the state
/// machine later — the same seam the pack's `VoiceActivityDetector`
/// keeps between Silero and its RMS fallback).
pub trait VadClassifier: Send + Sync {
    fn classify(&self, pcm: &[i16]) -> Classification;
}

/// Energy-based "very aggressive" classifier: RMS over the frame against
/// a fixed threshold tuned for 8 kHz telephony audio.
pub struct EnergyVad {
    threshold: f64,
}

impl EnergyVad {
    pub fn new() -> Self {
        // Tuned aggressive: telephony noise floor sits well below this.
        Self { threshold: 350.0 }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VadClassifier for EnergyVad {
    fn classify(&self, pcm: &[i16]) -> Classification {
        if pcm.is_empty() {
            return Classification::Error;
        }
        let sum_squares: f64 = pcm.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_squares / pcm.len() as f64).sqrt();
        if rms >= self.threshold {
            Classification::Voice
        } else {
            Classification::Silence
        }
    }
}

/// State carried across frames by the gate's state machine (spec §4.3
/// state-machine table). Lives on [`dg_domain::session::VadState`];
/// this type is the gate's pure transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Speaking,
}

/// Result of feeding one frame through the gate.
pub enum GateEvent {
    /// No phase transition this frame.
    None,
    /// idle → speaking (spec §4.3 row 1).
    SpeechStarted,
    /// speaking → idle; carries the concatenated utterance (spec §4.3
    /// row 4).
    SpeechEnded { utterance: Vec<Vec<u8>> },
}

/// Feeds one µ-law frame through the gate's state machine (spec §4.3
/// table, rows in order). `pending` accumulates raw frames for the
/// in-flight utterance; the caller (the per-call actor, which owns
/// `Session::vad_state`) supplies and mutates all carried state so this
/// function stays a pure transition step.
pub fn step(
    state: &mut GateState,
    speech_started_at: &mut Option<MonotonicMs>,
    last_voice_at: &mut Option<MonotonicMs>,
    pending: &mut VecDeque<Vec<u8>>,
    frame: &[u8],
    classifier: &dyn VadClassifier,
    config: &VadConfig,
) -> GateEvent {
    let pcm = mulaw_to_pcm(frame);
    let classification = classifier.classify(&pcm);
    let now = now_ms();

    match (*state, classification) {
        (GateState::Idle, Classification::Voice) => {
            *state = GateState::Speaking;
            *speech_started_at = Some(now);
            *last_voice_at = Some(now);
            pending.clear();
            pending.push_back(frame.to_vec());
            GateEvent::SpeechStarted
        }
        (GateState::Speaking, Classification::Voice) => {
            *last_voice_at = Some(now);
            pending.push_back(frame.to_vec());
            GateEvent::None
        }
        (GateState::Speaking, Classification::Silence) => {
            let silent_for = last_voice_at.map(|t| now.saturating_sub(t)).unwrap_or(0);
            if silent_for <= config.silence_ms {
                pending.push_back(frame.to_vec());
                GateEvent::None
            } else {
                let utterance: Vec<Vec<u8>> = pending.drain(..).collect();
                *state = GateState::Idle;
                *speech_started_at = None;
                *last_voice_at = None;
                GateEvent::SpeechEnded { utterance }
            }
        }
        (GateState::Idle, Classification::Silence) => GateEvent::None,
        (_, Classification::Error) => GateEvent::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier(Classification);
    impl VadClassifier for FixedClassifier {
        fn classify(&self, _pcm: &[i16]) -> Classification {
            self.0
        }
    }

    fn fresh() -> (GateState, Option<MonotonicMs>, Option<MonotonicMs>, VecDeque<Vec<u8>>) {
        (GateState::Idle, None, None, VecDeque::new())
    }

    #[test]
    fn mulaw_silence_byte_decodes_near_zero() {
        // 0xFF is conventional µ-law silence.
        let pcm = mulaw_to_pcm(&[0xFF]);
        assert!(pcm[0].abs() < 10);
    }

    #[test]
    fn idle_plus_voice_starts_speaking() {
        let (mut state, mut started, mut last, mut pending) = fresh();
        let config = VadConfig::default();
        let classifier = FixedClassifier(Classification::Voice);
        let event = step(
            &mut state,
            &mut started,
            &mut last,
            &mut pending,
            &[0u8; 160],
            &classifier,
            &config,
        );
        assert!(matches!(event, GateEvent::SpeechStarted));
        assert_eq!(state, GateState::Speaking);
        assert!(started.is_some());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn idle_plus_silence_stays_idle() {
        let (mut state, mut started, mut last, mut pending) = fresh();
        let config = VadConfig::default();
        let classifier = FixedClassifier(Classification::Silence);
        let event = step(
            &mut state,
            &mut started,
            &mut last,
            &mut pending,
            &[0xFFu8; 160],
            &classifier,
            &config,
        );
        assert!(matches!(event, GateEvent::None));
        assert_eq!(state, GateState::Idle);
    }

    #[test]
    fn speaking_plus_silence_within_hangover_stays_speaking() {
        let mut state = GateState::Speaking;
        let mut started = Some(now_ms());
        let mut last = Some(now_ms());
        let mut pending = VecDeque::new();
        let config = VadConfig::default();
        let classifier = FixedClassifier(Classification::Silence);
        let event = step(
            &mut state,
            &mut started,
            &mut last,
            &mut pending,
            &[0xFFu8; 160],
            &classifier,
            &config,
        );
        assert!(matches!(event, GateEvent::None));
        assert_eq!(state, GateState::Speaking);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn speaking_plus_silence_past_hangover_ends_speech() {
        let mut state = GateState::Speaking;
        let mut started = Some(0);
        let mut last = Some(0);
        let mut pending = VecDeque::new();
        pending.push_back(vec![1, 2, 3]);
        let mut config = VadConfig::default();
        config.silence_ms = 0; // force "now - last_voice_at > 0" to be true immediately
        let classifier = FixedClassifier(Classification::Silence);
        let event = step(
            &mut state,
            &mut started,
            &mut last,
            &mut pending,
            &[0xFFu8; 160],
            &classifier,
            &config,
        );
        match event {
            GateEvent::SpeechEnded { utterance } => assert_eq!(utterance.len(), 1),
            _ => panic!("expected SpeechEnded"),
        }
        assert_eq!(state, GateState::Idle);
        assert!(pending.is_empty());
    }

    #[test]
    fn energy_vad_classifies_silence_byte_as_silence() {
        let vad = EnergyVad::new();
        let pcm = mulaw_to_pcm(&[0xFFu8; 160]);
        assert_eq!(vad.classify(&pcm), Classification::Silence);
    }

    #[test]
    fn energy_vad_classifies_loud_tone_as_voice() {
        let vad = EnergyVad::with_threshold(100.0);
        let pcm: Vec<i16> = (0..160).map(|i| if i % 2 == 0 { 20000 } else { -20000 }).collect();
        assert_eq!(vad.classify(&pcm), Classification::Voice);
    }
}
