//! Repository trait for graph persistence
//!
//! The store keeps the canonical graph in memory and hands whole snapshots to
//! a repository after each ingestion. Backends only need to round-trip a
//! snapshot; relations arrive with bare-id endpoints.

use async_trait::async_trait;

use crate::error::Result;

use super::entity::Entity;
use super::snapshot::{Graph, GraphStats};

/// Repository trait for graph persistence
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Load the stored graph; empty if nothing was saved yet
    async fn load(&self) -> Result<Graph>;

    /// Replace the stored graph with this snapshot
    async fn save(&self, graph: &Graph) -> Result<()>;

    /// Get an entity by ID
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    /// Get graph statistics
    async fn stats(&self) -> Result<GraphStats>;
}
