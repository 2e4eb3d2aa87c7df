//! Storage gateways (C3).
//!
//! Two external stores sit behind these gateways: Neo4j for the property
//! graph and entities/relationships, Qdrant for the vector index of memory
//! embeddings. Both wrap a shared availability-cache pattern so a transient
//! outage in one store degrades gracefully instead of failing every request.

mod availability;
mod graph;
#[cfg(feature = "qdrant")]
mod vector;

pub use availability::AvailabilityCache;
pub use graph::{GraphGateway, GraphStats, Neo4jGateway};
#[cfg(feature = "qdrant")]
pub use vector::{QdrantGateway, VectorGateway};
