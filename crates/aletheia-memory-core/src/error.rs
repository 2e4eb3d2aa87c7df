//! Error types for the memory substrate.
//!
//! Driver exceptions never reach a caller verbatim (see [`CoreError`] variants
//! below) — they're logged at the call site with `tracing`, and the gateway's
//! availability cache is poisoned through `mark_down` before the error is
//! converted into the degraded-response shapes the HTTP layer expects.

/// Errors produced by the memory substrate.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The property graph rejected or failed a query.
    #[error("graph error: {0}")]
    Graph(String),

    /// The vector index rejected or failed an operation.
    #[error("vector error: {0}")]
    Vector(String),

    /// Requested id/name has no corresponding record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The configured LLM backend failed or is unavailable.
    #[error("llm error: {0}")]
    Llm(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// True for the class of graph failures the spec treats uniformly as
    /// "transient graph" (§7): connection refused, service unavailable, or
    /// the driver's own "neo4j" substring markers.
    pub fn is_transient_graph(&self) -> bool {
        match self {
            CoreError::Graph(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("neo4j")
                    || lower.contains("connection")
                    || lower.contains("serviceunavailable")
            }
            _ => false,
        }
    }
}
