//! Wire types for the TTS service contract (spec §4.6, §6).

use serde::{Deserialize, Serialize};

/// Beginning-of-stream message: voice parameters plus an API credential
/// (spec §4.6 "Beginning-of-stream").
#[derive(Debug, Clone, Serialize)]
pub struct BeginStream<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub voice: &'a str,
    pub speed: f32,
    pub stability: f32,
    pub similarity: f32,
    pub output_format: &'a str,
}

/// A single token push (spec §4.6 "Token push").
#[derive(Debug, Clone, Serialize)]
pub struct TokenPush<'a> {
    pub text: &'a str,
    /// Vendor-specific "eager generation" flag, set on every token push
    /// when the vendor supports it (spec §4.6).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub try_trigger_generation: bool,
}

/// End-of-input signal for the current turn (spec §4.6 "Flush").
#[derive(Debug, Clone, Serialize)]
pub struct Flush {
    pub text: &'static str,
    pub flush: bool,
}

impl Default for Flush {
    fn default() -> Self {
        Self {
            text: "",
            flush: true,
        }
    }
}

/// Downstream frame from the TTS service (spec §4.6 "Downstream
/// frames"). Exactly one of `audio` / `is_final` / `error` is set per
/// message in practice; modeled as an untagged enum so a malformed or
/// vendor-specific extra field doesn't break parsing of the fields we
/// care about.
#[derive(Debug, Clone, Deserialize)]
pub struct DownstreamFrame {
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default, rename = "isFinal")]
    pub is_final: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_default_matches_spec() {
        let flush = Flush::default();
        assert_eq!(flush.text, "");
        assert!(flush.flush);
    }

    #[test]
    fn token_push_omits_flag_when_false() {
        let push = TokenPush {
            text: "hi",
            try_trigger_generation: false,
        };
        let json = serde_json::to_string(&push).unwrap();
        assert_eq!(json, r#"{"text":"hi"}"#);
    }

    #[test]
    fn deserializes_audio_frame() {
        let json = r#"{"audio":"AAA="}"#;
        let frame: DownstreamFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.audio.as_deref(), Some("AAA="));
        assert!(!frame.is_final);
    }

    #[test]
    fn deserializes_final_frame() {
        let json = r#"{"isFinal":true}"#;
        let frame: DownstreamFrame = serde_json::from_str(json).unwrap();
        assert!(frame.is_final);
        assert!(frame.audio.is_none());
    }

    #[test]
    fn deserializes_error_frame() {
        let json = r#"{"error":"rate limited"}"#;
        let frame: DownstreamFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.error.as_deref(), Some("rate limited"));
    }
}
