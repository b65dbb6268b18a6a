mod llm;
mod server;
mod stt;
mod tts;
mod turn;
mod vad;

pub use llm::LlmConfig;
pub use server::{CorsConfig, ServerConfig};
pub use stt::SttConfig;
pub use tts::{TtsConfig, TtsVendor};
pub use turn::TurnConfig;
pub use vad::VadConfig;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config (spec §6 "Configuration (env-backed)")
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub turn: TurnConfig,
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Assemble configuration from environment variables, matching the
    /// recognized options and defaults of spec §6. Required fields
    /// (`STT_CLIENT_ID`, `STT_CLIENT_SECRET`, `LLM_API_KEY`) are left
    /// empty here if unset; [`Config::validate`] turns that into a
    /// startup-time hard error rather than a runtime surprise.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(v) = std::env::var("STT_CLIENT_ID") {
            config.stt.client_id = v;
        }
        if let Ok(v) = std::env::var("STT_CLIENT_SECRET") {
            config.stt.client_secret = v;
        }
        if let Ok(v) = std::env::var("STT_AUTH_URL") {
            config.stt.auth_url = v;
        }
        if let Ok(v) = std::env::var("STT_STREAM_URL") {
            config.stt.stream_url = v;
        }

        if let Ok(v) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            config.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(parsed) = v.parse() {
                config.llm.temperature = parsed;
            }
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = v;
        }

        if let Ok(v) = std::env::var("TTS_VENDOR") {
            config.tts.vendor = match v.as_str() {
                "openai-blocking" => TtsVendor::OpenaiBlocking,
                _ => TtsVendor::Streaming,
            };
        }
        if let Ok(v) = std::env::var("TTS_API_KEY") {
            config.tts.api_key = v;
        }
        if let Ok(v) = std::env::var("TTS_MODEL") {
            config.tts.model = v;
        }
        if let Ok(v) = std::env::var("TTS_VOICE") {
            config.tts.voice = v;
        }
        if let Ok(v) = std::env::var("TTS_SPEED") {
            if let Ok(parsed) = v.parse() {
                config.tts.speed = parsed;
            }
        }
        if let Ok(v) = std::env::var("TTS_STABILITY") {
            if let Ok(parsed) = v.parse() {
                config.tts.stability = parsed;
            }
        }
        if let Ok(v) = std::env::var("TTS_SIMILARITY") {
            if let Ok(parsed) = v.parse() {
                config.tts.similarity = parsed;
            }
        }

        if let Ok(v) = std::env::var("VAD_SILENCE_MS") {
            if let Ok(parsed) = v.parse() {
                config.vad.silence_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("INTERRUPT_FAST_MS") {
            if let Ok(parsed) = v.parse() {
                config.turn.interrupt_fast_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("INTERRUPT_SAFETY_MS") {
            if let Ok(parsed) = v.parse() {
                config.turn.interrupt_safety_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("INTERRUPT_TTS_RECENT_MS") {
            if let Ok(parsed) = v.parse() {
                config.turn.interrupt_tts_recent_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("TTS_FLUSH_QUIET_MS") {
            if let Ok(parsed) = v.parse() {
                config.tts.flush_quiet_ms = parsed;
            }
        }

        if let Ok(v) = std::env::var("TELEPHONY_LISTEN_ADDR") {
            if let Some((host, port)) = v.rsplit_once(':') {
                config.server.host = host.to_string();
                if let Ok(parsed) = port.parse() {
                    config.server.port = parsed;
                }
            }
        }

        config
    }

    /// Startup-time validation. Missing required credentials are a hard
    /// error (spec §6: `STT_CLIENT_ID`/`STT_CLIENT_SECRET`/`LLM_API_KEY`
    /// "required").
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "required but not set".into(),
                });
            }
        };
        require("STT_CLIENT_ID", &self.stt.client_id);
        require("STT_CLIENT_SECRET", &self.stt.client_secret);
        require("LLM_API_KEY", &self.llm.api_key);

        if matches!(self.tts.vendor, TtsVendor::Streaming) && self.tts.api_key.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "TTS_API_KEY".into(),
                message: "not set; TTS beginning-of-stream auth will fail".into(),
            });
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_flags_missing_required_fields() {
        let config = Config::default();
        let errors = config.validate();
        let fields: Vec<&str> = errors
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .map(|e| e.field.as_str())
            .collect();
        assert!(fields.contains(&"STT_CLIENT_ID"));
        assert!(fields.contains(&"STT_CLIENT_SECRET"));
        assert!(fields.contains(&"LLM_API_KEY"));
    }

    #[test]
    fn validate_passes_with_required_fields_set() {
        let mut config = Config::default();
        config.stt.client_id = "id".into();
        config.stt.client_secret = "secret".into();
        config.llm.api_key = "sk-test".into();
        config.tts.api_key = "tts-key".into();
        let errors = config.validate();
        assert!(errors
            .iter()
            .all(|e| e.severity != ConfigSeverity::Error));
    }

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.vad.silence_ms, 800);
        assert_eq!(config.turn.interrupt_fast_ms, 500);
        assert_eq!(config.turn.interrupt_safety_ms, 1500);
        assert_eq!(config.turn.interrupt_tts_recent_ms, 2000);
        assert_eq!(config.tts.flush_quiet_ms, 500);
    }
}
