//! Session Registry (spec §4.1): the process-wide keyed store of active
//! calls and the end-of-call hook seam.

pub mod registry;

pub use registry::{EndOfCallHook, LoggingHook, SessionRegistry};
