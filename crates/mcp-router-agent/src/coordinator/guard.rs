//! Per-key admission.
//!
//! A key is live from admission until its `KeyGuard` is released or
//! dropped. Finished `(key, query)` pairs are remembered so a host that
//! re-sends the same query does not start a second exchange.

use mcp_router_common::SessionKey;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::CoordinatorError;

const RECENT_CAPACITY: usize = 256;

pub(crate) type CompletionHook = Arc<dyn Fn(&SessionKey) + Send + Sync>;

#[derive(Default)]
struct Slots {
    live: HashMap<SessionKey, String>,
    recent: VecDeque<(SessionKey, String)>,
}

#[derive(Default)]
pub(crate) struct KeyRegistry {
    slots: Mutex<Slots>,
}

pub(crate) enum Admission {
    Admitted(KeyGuard),
    /// Same query already running or just finished on this key.
    Duplicate,
}

impl KeyRegistry {
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn admit(
        self: &Arc<Self>,
        key: &SessionKey,
        query: &str,
        hook: Option<CompletionHook>,
    ) -> Result<Admission, CoordinatorError> {
        let mut slots = self.lock();
        if let Some(running) = slots.live.get(key) {
            if running == query {
                return Ok(Admission::Duplicate);
            }
            return Err(CoordinatorError::SessionBusy(key.clone()));
        }
        if slots.recent.iter().any(|(k, q)| k == key && q == query) {
            return Ok(Admission::Duplicate);
        }
        slots.live.insert(key.clone(), query.to_string());
        Ok(Admission::Admitted(KeyGuard {
            registry: Arc::clone(self),
            key: key.clone(),
            hook,
            released: false,
        }))
    }

    pub(crate) fn is_live(&self, key: &SessionKey) -> bool {
        self.lock().live.contains_key(key)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn release(&self, key: &SessionKey) {
        let mut slots = self.lock();
        if let Some(query) = slots.live.remove(key) {
            if slots.recent.len() == RECENT_CAPACITY {
                slots.recent.pop_front();
            }
            slots.recent.push_back((key.clone(), query));
        }
    }
}

/// Holds a key live. Releases exactly once, on `release` or drop.
pub(crate) struct KeyGuard {
    registry: Arc<KeyRegistry>,
    key: SessionKey,
    hook: Option<CompletionHook>,
    released: bool,
}

impl KeyGuard {
    pub(crate) fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.registry.release(&self.key);
        debug!(session_key = %self.key, "session key released");
        if let Some(hook) = &self.hook {
            hook(&self.key);
        }
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}
