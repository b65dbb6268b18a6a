//! Library half of the `dialogue-gateway` binary: the axum routes, the
//! per-call Turn Controller actor, and the VAD/framing helpers it owns.
//! Split out from `main.rs` so the actor can be driven directly from
//! integration tests (`tests/turn_scenarios.rs`) the way the teacher's
//! `node-sdk` crate is driven from `tests/protocol_loop.rs`, with a fake
//! gateway-side peer in place of the real one.

pub mod healthz;
pub mod state;
pub mod telephony_ws;
pub mod tts_framer;
pub mod turn;
pub mod vad;
