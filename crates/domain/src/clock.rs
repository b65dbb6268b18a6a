use std::sync::OnceLock;
use std::time::Instant;

/// A monotonic millisecond timestamp. Not wall-clock time — only
/// differences between two `MonotonicMs` values are meaningful.
pub type MonotonicMs = u64;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since the first call to `now_ms` in this process.
///
/// All of spec §3/§4's `*At`/`VADEnd`/`LLMCall` timestamps are measured
/// this way rather than against wall-clock time, matching §5's
/// "monotonic-ms" contract and avoiding clock-skew/leap-second hazards.
pub fn now_ms() -> MonotonicMs {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u64
}
