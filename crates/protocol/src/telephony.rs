//! Wire types for the telephony duplex stream (spec §6 "Telephony duplex
//! stream"), grounded in the Twilio Media Streams event shape used by the
//! reference `twilio-media.rs` handler: a tagged `event` enum for inbound
//! frames, and a small set of outbound control/media events.

use serde::{Deserialize, Serialize};

/// Inbound events from the telephony carrier (spec §4.2 "Media Ingress",
/// §6). Unknown `event` values fail to deserialize into this enum; the
/// caller falls back to logging a warning and dropping the frame (spec
/// §4.2 "Unknown event kinds are ignored with a warning").
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundEvent {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        start: StartMetadata,
    },
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        #[serde(default)]
        mark: Option<MarkPayload>,
    },
    Stop {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
    #[serde(default)]
    pub custom_parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaFormat {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default, rename = "sampleRate")]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u8>,
}

/// One 20 ms frame: base64-encoded µ-law 8 kHz audio, 160 bytes decoded
/// (spec §4.2).
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Outbound events to the telephony sink (spec §6 "Outbound events",
/// §4.6, §4.7). Implementations of
/// [`dg_domain::telephony::TelephonyOut`] serialize these.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundEvent<'a> {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
        media: OutboundMediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
        mark: MarkPayload,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMediaPayload {
    pub payload: String,
}
