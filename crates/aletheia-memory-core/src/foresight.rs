//! Anticipatory signals attached to entities by `HAS_FORESIGHT` — fed by the
//! attention daemon's collectors and surfaced back through the memory-state
//! collector's poll of `/foresight/active`.

use chrono::{DateTime, Utc};

use crate::engine::MemoryEngine;
use crate::error::Result;
use crate::model::ForesightSignal;

impl MemoryEngine {
    pub async fn add_foresight(
        &self,
        entity: &str,
        signal: &str,
        expiry: Option<DateTime<Utc>>,
        weight: f64,
    ) -> Result<ForesightSignal> {
        let activation = Utc::now();
        self.graph
            .upsert_foresight(entity, signal, activation, expiry, weight)
            .await?;
        Ok(ForesightSignal {
            entity: entity.to_string(),
            signal: signal.to_string(),
            activation,
            expiry,
            weight,
        })
    }

    pub async fn active_foresight(&self) -> Result<Vec<ForesightSignal>> {
        self.graph.active_foresight().await
    }

    /// Decay every past-expiry signal by `ForesightSignal::DECAY_STEP`,
    /// deleting any that reach weight <= 0.
    pub async fn decay_foresight(&self) -> Result<u64> {
        self.graph.decay_foresight().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_step_matches_model_constant() {
        assert_eq!(ForesightSignal::DECAY_STEP, 0.1);
    }
}
