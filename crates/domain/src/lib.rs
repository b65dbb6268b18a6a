//! Shared types for the dialogue-gateway workspace: the `Session`/`Turn`
//! data model, config, error type, and the small collaborator traits
//! (`TelephonyOut`) that let the gateway crate depend only on domain.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod stream;
pub mod telephony;
pub mod trace;
pub mod turn;
