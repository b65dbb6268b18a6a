//! Wire types for the three external collaborators (spec §6 "External
//! interfaces"): telephony duplex stream, STT auth/stream contract, and
//! TTS control messages. Grounded in the teacher's `WsMessage`
//! tagged-enum style, applied to the Twilio Media Streams event shape
//! seen in the pack's reference handler.

pub mod stt;
pub mod telephony;
pub mod tts;
