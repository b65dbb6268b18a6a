//! Wire types for the STT service contract (spec §4.4, §6).

use serde::{Deserialize, Serialize};

/// `POST` form-encoded request to the bearer-token auth endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Unix epoch seconds at which the token expires.
    pub expire_at: i64,
}

/// One downstream result frame (spec §4.4: `{seq, final, alternatives}`).
#[derive(Debug, Clone, Deserialize)]
pub struct SttResult {
    pub seq: u64,
    pub r#final: bool,
    #[serde(default)]
    pub alternatives: Vec<SttAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttAlternative {
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
}

impl SttResult {
    /// The text of the first alternative, if any and non-empty (spec
    /// §4.4 "Aggregation": "each downstream frame with non-empty
    /// alternatives[0].text").
    pub fn primary_text(&self) -> Option<&str> {
        self.alternatives
            .first()
            .map(|a| a.text.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Sentinel text frame sent to terminate the upstream stream (spec §4.4
/// "Shutdown").
pub const EOS_SENTINEL: &str = "EOS";

/// Query parameters for the streaming WebSocket connect (spec §6).
pub fn stream_query_string() -> &'static str {
    "sample_rate=8000&encoding=MULAW&use_itn=true&use_disfluency_filter=true&use_profanity_filter=true"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_text_is_none_when_empty() {
        let result = SttResult {
            seq: 1,
            r#final: false,
            alternatives: vec![SttAlternative {
                text: String::new(),
                confidence: 0.0,
            }],
        };
        assert_eq!(result.primary_text(), None);
    }

    #[test]
    fn primary_text_present() {
        let result = SttResult {
            seq: 1,
            r#final: true,
            alternatives: vec![SttAlternative {
                text: "hello".into(),
                confidence: 0.9,
            }],
        };
        assert_eq!(result.primary_text(), Some("hello"));
    }

    #[test]
    fn deserializes_result_frame() {
        let json = r#"{"seq":3,"final":true,"alternatives":[{"text":"hi","confidence":0.95}]}"#;
        let result: SttResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.seq, 3);
        assert!(result.r#final);
        assert_eq!(result.primary_text(), Some("hi"));
    }
}
