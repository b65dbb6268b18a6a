//! STT Multiplexer's upstream half (spec §4.4): bearer-token auth with
//! caching/renewal, and the duplex WebSocket stream that carries raw
//! µ-law frames upstream and JSON result frames downstream.
//!
//! The per-call fan-out (gating on `isSpeaking`, aggregating finals into
//! `transcriptBuffer`) lives in the gateway crate's `stt` module; this
//! module only owns the wire-level connection to the external service.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use dg_domain::config::SttConfig;
use dg_domain::error::{Error, Result};
use dg_protocol::stt::{stream_query_string, SttResult, TokenRequest, TokenResponse, EOS_SENTINEL};

/// One aggregated downstream result, already stripped to what the Turn
/// Controller needs (spec §4.4 "Aggregation").
#[derive(Debug, Clone)]
pub enum SttEvent {
    Partial { text: String },
    Final { text: String },
}

/// A live duplex connection to the STT service for one call.
#[async_trait]
pub trait SttSession: Send + Sync {
    /// Forward one µ-law frame upstream. Called by the VAD Gate only
    /// while `isSpeaking` (spec §4.4 "Forwarding").
    async fn send_audio(&self, frame: &[u8]) -> Result<()>;

    /// Sends the `"EOS"` sentinel and closes after the configured grace
    /// period (spec §4.4 "Shutdown").
    async fn close(&self);
}

#[async_trait]
pub trait SttClient: Send + Sync {
    /// Opens one persistent stream for the call (spec §4.4 "Session
    /// start": "one outbound open per call; fails the session if
    /// unreachable"). `on_event` receives downstream results in STT
    /// sequence order.
    async fn connect(
        &self,
        call_id: &str,
        on_event: mpsc::UnboundedSender<SttEvent>,
    ) -> Result<Arc<dyn SttSession>>;
}

/// Caches the bearer token returned by the auth endpoint until expiry,
/// renewing on 401 or when the cached token has expired (spec §4.4
/// "Token management").
pub struct TokenCache {
    cached: Mutex<Option<(String, i64)>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self, client: &reqwest::Client, config: &SttConfig) -> Result<String> {
        if let Some((token, expire_at)) = self.cached.lock().clone() {
            if !is_expired(expire_at) {
                return Ok(token);
            }
        }
        self.refresh(client, config).await
    }

    /// Forces a refresh regardless of cached expiry — the path taken on
    /// a 401 from the streaming endpoint (spec §4.4, §7 "Auth").
    pub async fn refresh(&self, client: &reqwest::Client, config: &SttConfig) -> Result<String> {
        let request = TokenRequest {
            client_id: &config.client_id,
            client_secret: &config.client_secret,
        };
        let response = client
            .post(&config.auth_url)
            .form(&request)
            .send()
            .await
            .map_err(|e| Error::stt(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "STT token endpoint returned {}",
                response.status()
            )));
        }
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::stt(format!("malformed token response: {e}")))?;
        *self.cached.lock() = Some((parsed.access_token.clone(), parsed.expire_at));
        Ok(parsed.access_token)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(expire_at: i64) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    now >= expire_at
}

/// Default [`SttClient`]: a WebSocket connection carrying binary µ-law
/// frames upstream and JSON [`SttResult`] frames downstream.
pub struct WsSttClient {
    config: SttConfig,
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
}

impl WsSttClient {
    pub fn new(config: SttConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            tokens: Arc::new(TokenCache::new()),
        }
    }
}

#[async_trait]
impl SttClient for WsSttClient {
    async fn connect(
        &self,
        call_id: &str,
        on_event: mpsc::UnboundedSender<SttEvent>,
    ) -> Result<Arc<dyn SttSession>> {
        let token = self.tokens.token(&self.http, &self.config).await?;
        let url = format!(
            "{}?{}",
            self.config.stream_url,
            stream_query_string()
        );

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Host", extract_host(&url))
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .body(())
            .map_err(|e| Error::stt(format!("bad STT URL: {e}")))?;

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::stt(format!("STT connect failed for {call_id}: {e}")))?;

        let (mut sink, mut stream) = ws.split();
        let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<Frame>();

        tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                let msg = match frame {
                    Frame::Audio(bytes) => WsMessage::Binary(bytes),
                    Frame::Eos => WsMessage::Text(EOS_SENTINEL.to_string()),
                };
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                if let WsMessage::Text(text) = msg {
                    match serde_json::from_str::<SttResult>(&text) {
                        Ok(result) => {
                            if let Some(text) = result.primary_text() {
                                let event = if result.r#final {
                                    SttEvent::Final {
                                        text: text.to_string(),
                                    }
                                } else {
                                    SttEvent::Partial {
                                        text: text.to_string(),
                                    }
                                };
                                if on_event.send(event).is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping malformed STT result frame");
                        }
                    }
                }
            }
        });

        Ok(Arc::new(WsSttSession {
            audio_tx,
            grace_ms: self.config.eos_grace_ms,
        }))
    }
}

enum Frame {
    Audio(Vec<u8>),
    Eos,
}

struct WsSttSession {
    audio_tx: mpsc::UnboundedSender<Frame>,
    grace_ms: u64,
}

#[async_trait]
impl SttSession for WsSttSession {
    async fn send_audio(&self, frame: &[u8]) -> Result<()> {
        self.audio_tx
            .send(Frame::Audio(frame.to_vec()))
            .map_err(|_| Error::stt("STT writer task has shut down"))
    }

    async fn close(&self) {
        let _ = self.audio_tx.send(Frame::Eos);
        tokio::time::sleep(std::time::Duration::from_millis(self.grace_ms)).await;
    }
}

fn extract_host(url: &str) -> String {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split(['/', '?']).next())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_expired_true_in_the_past() {
        assert!(is_expired(0));
    }

    #[test]
    fn is_expired_false_far_future() {
        assert!(!is_expired(9_999_999_999));
    }

    #[test]
    fn extract_host_strips_scheme_and_path() {
        assert_eq!(
            extract_host("wss://stt.example.com/v1/stream?x=1"),
            "stt.example.com"
        );
    }
}
