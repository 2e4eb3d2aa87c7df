//! Cached availability check shared by both storage gateways.
//!
//! A failed probe or operation marks the store down for [`config::AVAILABILITY_CACHE_TTL_SECS`];
//! a successful one marks it up immediately. Between probes, the cached
//! verdict is returned without touching the network.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::AVAILABILITY_CACHE_TTL_SECS;

struct State {
    ok: Option<bool>,
    checked_at: Instant,
}

pub struct AvailabilityCache {
    state: Mutex<State>,
    ttl: Duration,
}

impl Default for AvailabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                ok: None,
                checked_at: Instant::now(),
            }),
            ttl: Duration::from_secs(AVAILABILITY_CACHE_TTL_SECS),
        }
    }

    /// Returns the cached verdict if still fresh.
    pub fn cached(&self) -> Option<bool> {
        let state = self.state.lock().unwrap();
        if state.ok.is_some() && state.checked_at.elapsed() < self.ttl {
            state.ok
        } else {
            None
        }
    }

    pub fn mark_ok(&self) {
        let mut state = self.state.lock().unwrap();
        state.ok = Some(true);
        state.checked_at = Instant::now();
    }

    pub fn mark_down(&self) {
        let mut state = self.state.lock().unwrap();
        state.ok = Some(false);
        state.checked_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_has_no_verdict() {
        let cache = AvailabilityCache::new();
        assert_eq!(cache.cached(), None);
    }

    #[test]
    fn marks_persist_until_queried() {
        let cache = AvailabilityCache::new();
        cache.mark_ok();
        assert_eq!(cache.cached(), Some(true));
        cache.mark_down();
        assert_eq!(cache.cached(), Some(false));
    }
}
