/// Shared error type used across all dialogue-gateway crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Upstream provider failure, tagged by which collaborator produced it.
    #[error("{provider}: {message}")]
    Provider { provider: Provider, message: String },

    #[error("auth: {0}")]
    Auth(String),

    #[error("config: {0}")]
    Config(String),

    /// Expected cancellation (interrupt / call close), not a genuine failure.
    ///
    /// Distinguished from the other variants so call sites can `log::debug!`
    /// rather than `log::error!` on the "aborted" path (spec'd error channel).
    #[error("aborted")]
    Aborted,

    /// Double-commit, phase transition out of order, or similar broken
    /// invariant. Debug builds `debug_assert!` before this is ever
    /// constructed; release builds log and skip.
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("{0}")]
    Other(String),
}

/// Which upstream collaborator a [`Error::Provider`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Stt,
    Llm,
    Tts,
    Telephony,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provider::Stt => "stt",
            Provider::Llm => "llm",
            Provider::Tts => "tts",
            Provider::Telephony => "telephony",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn stt(message: impl Into<String>) -> Self {
        Error::Provider {
            provider: Provider::Stt,
            message: message.into(),
        }
    }
    pub fn llm(message: impl Into<String>) -> Self {
        Error::Provider {
            provider: Provider::Llm,
            message: message.into(),
        }
    }
    pub fn tts(message: impl Into<String>) -> Self {
        Error::Provider {
            provider: Provider::Tts,
            message: message.into(),
        }
    }

    /// `true` for the cooperative-cancellation path, which the error
    /// channel design note requires call sites to treat as expected.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
