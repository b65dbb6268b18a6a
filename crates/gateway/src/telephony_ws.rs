//! Media Ingress (spec §4.2): the axum WebSocket endpoint the telephony
//! carrier connects to. Grounded in the pack's `node_ws`/`handle_socket`
//! shape (upgrade, split the socket, a writer task draining an outbound
//! channel, a reader loop matching on message kind, cleanup on loop
//! exit) with the node-hello handshake and per-node auth dropped — this
//! socket instead starts with the carrier's own `start` event (spec
//! §4.2), which is what spawns the per-call actor.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use dg_domain::error::{Error, Result};
use dg_domain::telephony::TelephonyOut;
use dg_protocol::telephony::{InboundEvent, MarkPayload, OutboundEvent, OutboundMediaPayload};

use crate::state::AppState;
use crate::turn::ActorEvent;

/// Used when the carrier's `start.customParameters` carries no
/// `system_prompt` entry (spec §3: "immutable string supplied at
/// session creation" — the control plane that would normally supply it
/// is out of scope here, so the telephony socket is the fallback
/// source).
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful phone assistant. Keep responses brief and conversational.";

pub async fn telephony_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut call_handle: Option<mpsc::UnboundedSender<ActorEvent>> = None;
    let mut call_id = String::new();

    while let Some(Ok(msg)) = ws_stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let event: InboundEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(_) => {
                tracing::warn!(call_id = %call_id, "unrecognized telephony event, dropping");
                continue;
            }
        };

        match event {
            InboundEvent::Connected { .. } => {}
            InboundEvent::Start { stream_sid, start } => {
                call_id = start.call_sid.clone().unwrap_or_else(|| stream_sid.clone());
                let system_prompt = start
                    .custom_parameters
                    .as_ref()
                    .and_then(|v| v.get("system_prompt"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

                let telephony_out: Arc<dyn TelephonyOut> = Arc::new(WsTelephonyOut {
                    stream_sid: stream_sid.clone(),
                    tx: out_tx.clone(),
                });

                let tx = crate::turn::spawn(
                    call_id.clone(),
                    system_prompt,
                    state.config.clone(),
                    state.stt.clone(),
                    state.llm.clone(),
                    state.tts.clone(),
                    state.registry.clone(),
                );
                state.registry.insert(call_id.clone(), tx.clone());
                let _ = tx.send(ActorEvent::Start {
                    stream_id: stream_sid,
                    telephony_out,
                });
                call_handle = Some(tx);
            }
            InboundEvent::Media { media, .. } => {
                let Some(tx) = &call_handle else { continue };
                match base64::engine::general_purpose::STANDARD.decode(&media.payload) {
                    Ok(bytes) => {
                        let _ = tx.send(ActorEvent::Media { payload: bytes });
                    }
                    Err(e) => tracing::warn!(call_id = %call_id, error = %e, "dropping unparseable media payload"),
                }
            }
            InboundEvent::Mark { .. } => {}
            InboundEvent::Stop { .. } => {
                if let Some(tx) = &call_handle {
                    let _ = tx.send(ActorEvent::Stop);
                }
                break;
            }
        }
    }

    if let Some(tx) = &call_handle {
        let _ = tx.send(ActorEvent::Stop);
    }
    writer.abort();
}

/// [`TelephonyOut`] over this socket's outbound channel.
struct WsTelephonyOut {
    stream_sid: String,
    tx: mpsc::UnboundedSender<Message>,
}

impl WsTelephonyOut {
    fn send_json(&self, event: &OutboundEvent<'_>) -> Result<()> {
        let json = serde_json::to_string(event).map_err(Error::Json)?;
        self.tx
            .send(Message::Text(json))
            .map_err(|_| Error::Other("telephony writer has shut down".into()))
    }
}

#[async_trait]
impl TelephonyOut for WsTelephonyOut {
    async fn send_media(&self, payload: &[u8]) -> Result<()> {
        let b64 = base64::engine::general_purpose::STANDARD.encode(payload);
        self.send_json(&OutboundEvent::Media {
            stream_sid: &self.stream_sid,
            media: OutboundMediaPayload { payload: b64 },
        })
    }

    async fn send_mark(&self, name: &str) -> Result<()> {
        self.send_json(&OutboundEvent::Mark {
            stream_sid: &self.stream_sid,
            mark: MarkPayload { name: name.to_string() },
        })
    }

    async fn send_clear(&self) -> Result<()> {
        self.send_json(&OutboundEvent::Clear {
            stream_sid: &self.stream_sid,
        })
    }
}
