//! Shared HTTP handler state.

use std::sync::Arc;
use std::time::Instant;

use aletheia_memory_core::MemoryEngine;

/// Read-mostly handle the rest of the surface hangs off of. The memory
/// engine itself is effectively read-only after startup; LLM-instance
/// rotation happens inside `MemoryEngine` without replacing this handle.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MemoryEngine>,
    pub token: Option<String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<MemoryEngine>, token: Option<String>) -> Self {
        Self {
            engine,
            token,
            start_time: Instant::now(),
        }
    }
}
