use async_trait::async_trait;

use crate::error::Result;

/// Outbound frame sink for one call's telephony media stream (spec §3
/// `telephonyOut`, §6 "Outbound events"). Implemented over whatever wire
/// transport the Media Ingress handler is using; the dialogue pipeline
/// only ever sees this capability, never the socket itself.
#[async_trait]
pub trait TelephonyOut: Send + Sync {
    /// Send one 20 ms µ-law frame (160 bytes) as an outbound `media` event.
    async fn send_media(&self, payload: &[u8]) -> Result<()>;

    /// Send a `mark` event carrying an opaque name, used for
    /// playback-completion signaling (spec §4.6, every 10th frame).
    async fn send_mark(&self, name: &str) -> Result<()>;

    /// Send a `clear` event to discard any audio buffered downstream of
    /// the receiver. Always emitted before the next turn's first frame
    /// on barge-in (spec §4.7 interrupt handler step 2).
    async fn send_clear(&self) -> Result<()>;
}
