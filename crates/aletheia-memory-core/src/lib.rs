//! # Aletheia Memory Core
//!
//! Long-lived memory substrate for a cohort of AI agents. Ingests raw
//! interaction text (or pre-extracted facts), dedupes semantically, fuses
//! vector and graph retrieval, tracks bi-temporal facts, evolves and decays
//! memories over time, and surfaces graph analytics and serendipitous
//! discovery over the accumulated knowledge graph.
//!
//! ## Layout
//!
//! - [`model`] — the data types shared across every component
//! - [`vocab`] / [`entity`] — controlled relationship vocabulary and entity
//!   name resolution (both pure, deterministic)
//! - [`backend`] — three-tier LLM backend detection (OAuth, API key, Ollama,
//!   embedding-only)
//! - [`storage`] — the Neo4j and Qdrant gateways behind [`storage::GraphGateway`]
//!   and [`storage::VectorGateway`]
//! - [`embedding`] / [`llm`] — outbound clients for the embedding provider and
//!   the fact-extraction/merge/rewrite LLM calls
//! - [`engine`] — [`engine::MemoryEngine`], the handle the rest of the crate's
//!   `impl` blocks hang off of
//! - [`ingest`], [`retrieval`], [`temporal`], [`evolution`], [`analytics`],
//!   [`foresight`] — one module per pipeline, each contributing `impl
//!   MemoryEngine` blocks
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use aletheia_memory_core::{MemoryEngine, SidecarConfig};
//!
//! let config = SidecarConfig::from_env();
//! let backend = aletheia_memory_core::backend::detect_backend(&config).await;
//! let engine = MemoryEngine::new(vector, graph, embeddings, llm, backend, config);
//!
//! engine.add("Cody prefers dark roast coffee", "cody", None, serde_json::Value::Null).await?;
//! let hits = engine.search("coffee preference", "cody", 5).await?;
//! ```

pub mod analytics;
pub mod backend;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod entity;
pub mod error;
pub mod evolution;
pub mod foresight;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod retrieval;
pub mod storage;
pub mod temporal;
pub mod vocab;

pub use config::SidecarConfig;
pub use engine::MemoryEngine;
pub use error::{CoreError, Result};
