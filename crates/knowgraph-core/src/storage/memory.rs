//! In-memory graph repository

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::graph::{Entity, Graph, GraphRepository, GraphStats};
use crate::error::Result;

/// Repository that keeps the snapshot in process memory
///
/// Used by tests and by sessions that do not need to outlive the process.
#[derive(Debug, Default)]
pub struct MemoryGraphRepository {
    graph: RwLock<Graph>,
}

impl MemoryGraphRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository that already holds a graph
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            graph: RwLock::new(graph.detached()),
        }
    }
}

#[async_trait]
impl GraphRepository for MemoryGraphRepository {
    async fn load(&self) -> Result<Graph> {
        Ok(self.graph.read().await.clone())
    }

    async fn save(&self, graph: &Graph) -> Result<()> {
        *self.graph.write().await = graph.detached();
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.graph.read().await.entity(id).cloned())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(self.graph.read().await.stats())
    }
}
