//! Process-wide shared state handed to every axum handler: configuration,
//! the three upstream provider clients (one instance each, reused across
//! calls per spec §5 "no pooling across calls" — each call opens its own
//! session on top of these), and the Session Registry.

use std::sync::Arc;

use dg_domain::config::{Config, TtsVendor};
use dg_providers::llm::{LlmClient, OpenAiCompatLlm};
use dg_providers::stt::{SttClient, WsSttClient};
use dg_providers::tts::{BlockingTts, StreamingTts, TtsClient};
use dg_sessions::{LoggingHook, SessionRegistry};
use tokio::sync::mpsc;

use crate::turn::ActorEvent;

/// Handle the registry holds per call: the actor task's inbound event
/// queue (spec §9 "per-call actor over callback soup").
pub type CallHandle = mpsc::UnboundedSender<ActorEvent>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stt: Arc<dyn SttClient>,
    pub llm: Arc<dyn LlmClient>,
    pub tts: Arc<dyn TtsClient>,
    pub registry: Arc<SessionRegistry<CallHandle>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let stt: Arc<dyn SttClient> = Arc::new(WsSttClient::new(config.stt.clone()));
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatLlm::new(config.llm.clone())?);
        let tts: Arc<dyn TtsClient> = match config.tts.vendor {
            TtsVendor::Streaming => Arc::new(StreamingTts::new(config.tts.clone())),
            TtsVendor::OpenaiBlocking => Arc::new(BlockingTts::new(config.tts.clone())),
        };
        let registry = Arc::new(SessionRegistry::new(vec![Arc::new(LoggingHook)]));
        Ok(Self {
            config,
            stt,
            llm,
            tts,
            registry,
        })
    }
}
