//! Knowgraph Core Library
//!
//! This crate provides the core functionality for Knowgraph, including:
//! - Graph model and consolidation engine (bigram similarity, identity
//!   resolution, merge and edge filtering)
//! - Graph store with persistence and snapshot publishing
//! - Storage (in-memory and JSONL repositories)
//! - LLM integration (OpenAI-compatible providers with ordered fallback)
//! - Configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::graph::{
        Consolidation, Endpoint, Entity, Graph, GraphBatch, GraphGenerator, GraphRepository,
        GraphStore, IngestOutcome, Relation, consolidate, similarity,
    };
    pub use crate::error::{Error, Result};
    pub use crate::llm::{LlmClient, ProviderContext};
    pub use crate::storage::{JsonlGraphRepository, MemoryGraphRepository};
}
