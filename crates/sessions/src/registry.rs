//! Process-wide keyed store of active calls (spec §4.1).
//!
//! Grounded in the teacher's single `parking_lot::Mutex`-guarded map with
//! idempotent remove (its `CancelMap`/`NodeRegistry` shape). The registry
//! does not hold the `Session` itself — per its single-writer discipline
//! (spec §5), a `Session` is owned exclusively by its per-call actor task.
//! The registry holds `H`, a cheap `Clone`-able handle the rest of the
//! process uses to reach that task (in the gateway crate, an
//! `mpsc::UnboundedSender` of turn-controller events).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use dg_domain::message::HistoryEntry;

/// External teardown side effect run once per call, after the registry
/// entry is removed (spec §4.1: "invoke registered end-of-call hooks
/// (external: persistence, webhook)"). Concrete hooks are out of scope;
/// the default registry runs zero of them.
#[async_trait]
pub trait EndOfCallHook: Send + Sync {
    async fn on_call_ended(&self, call_id: &str, final_history: &[HistoryEntry]);
}

struct State<H> {
    sessions: HashMap<String, H>,
    closing: HashSet<String>,
}

pub struct SessionRegistry<H> {
    state: Mutex<State<H>>,
    hooks: Vec<Arc<dyn EndOfCallHook>>,
}

impl<H: Clone + Send + Sync + 'static> SessionRegistry<H> {
    pub fn new(hooks: Vec<Arc<dyn EndOfCallHook>>) -> Self {
        Self {
            state: Mutex::new(State {
                sessions: HashMap::new(),
                closing: HashSet::new(),
            }),
            hooks,
        }
    }

    /// Registers a new call's handle (spec §4.1 `create`). Overwrites any
    /// existing entry for the same `call_id` — callers are expected to
    /// have already closed a prior session before reusing an id.
    pub fn insert(&self, call_id: impl Into<String>, handle: H) {
        self.state.lock().sessions.insert(call_id.into(), handle);
    }

    /// Spec §4.1 `get`.
    pub fn get(&self, call_id: &str) -> Option<H> {
        self.state.lock().sessions.get(call_id).cloned()
    }

    pub fn is_closing(&self, call_id: &str) -> bool {
        self.state.lock().closing.contains(call_id)
    }

    /// Removes the call and runs its end-of-call hooks exactly once
    /// (spec §4.1 `closeAll`: idempotent via the `closingSet` guard —
    /// concurrent close paths from telephony socket close, telephony
    /// `stop`, and upstream error all race here harmlessly). The
    /// resource teardown (cancel LLM, close STT/TTS, close telephony
    /// writer) happens in the per-call actor before it drops its handle;
    /// this only runs the external hooks and forgets the handle.
    pub async fn close_all(&self, call_id: &str, final_history: &[HistoryEntry]) {
        let first = {
            let mut state = self.state.lock();
            if !state.closing.insert(call_id.to_string()) {
                return;
            }
            state.sessions.remove(call_id);
            true
        };
        if !first {
            return;
        }
        for hook in &self.hooks {
            hook.on_call_ended(call_id, final_history).await;
        }
    }
}

/// Logging no-op hook exercising the seam (spec §9 "concrete hooks are
/// out of scope").
pub struct LoggingHook;

#[async_trait]
impl EndOfCallHook for LoggingHook {
    async fn on_call_ended(&self, call_id: &str, final_history: &[HistoryEntry]) {
        tracing::info!(call_id, turns = final_history.len(), "call ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_returns_inserted_handle() {
        let registry: SessionRegistry<u32> = SessionRegistry::new(vec![]);
        registry.insert("call-1", 42);
        assert_eq!(registry.get("call-1"), Some(42));
        assert_eq!(registry.get("call-2"), None);
    }

    #[tokio::test]
    async fn close_all_is_idempotent() {
        struct CountingHook(Arc<AtomicUsize>);
        #[async_trait]
        impl EndOfCallHook for CountingHook {
            async fn on_call_ended(&self, _call_id: &str, _history: &[HistoryEntry]) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let registry: SessionRegistry<u32> =
            SessionRegistry::new(vec![Arc::new(CountingHook(count.clone()))]);
        registry.insert("call-1", 1);

        registry.close_all("call-1", &[]).await;
        registry.close_all("call-1", &[]).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get("call-1"), None);
    }

    #[tokio::test]
    async fn close_all_removes_the_handle() {
        let registry: SessionRegistry<u32> = SessionRegistry::new(vec![]);
        registry.insert("call-1", 7);
        registry.close_all("call-1", &[]).await;
        assert!(registry.get("call-1").is_none());
    }
}
