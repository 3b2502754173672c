//! Graph store
//!
//! Holds the canonical graph, runs every ingestion through
//! [`consolidate`](super::consolidate), persists the result, and republishes
//! the new snapshot to subscribers such as a renderer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::llm::{CompletionBackend, ProviderContext};

use super::consolidation::{DroppedRelation, EntityMerge, consolidate_batch};
use super::entity::Position;
use super::event::GraphEvent;
use super::generator::GraphGenerator;
use super::repository::GraphRepository;
use super::snapshot::{Graph, GraphBatch};

/// Summary of one ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub ingestion_id: Uuid,
    /// Incoming entities folded into an existing entity
    pub merged_count: usize,
    pub entities_added: usize,
    pub relations_added: usize,
    pub relations_dropped: usize,
    pub merges: Vec<EntityMerge>,
    pub dropped: Vec<DroppedRelation>,
}

impl IngestOutcome {
    /// One-line message suitable for a status bar
    pub fn status_message(&self) -> String {
        if self.merged_count > 0 {
            format!("Consolidated {} duplicate entities", self.merged_count)
        } else {
            format!(
                "Added {} entities and {} relations",
                self.entities_added, self.relations_added
            )
        }
    }
}

/// Owner of the canonical graph
///
/// Ingestion takes `&mut self`, so two batches can never be consolidated
/// against the same snapshot concurrently.
pub struct GraphStore<R: GraphRepository> {
    repository: Arc<R>,
    graph: Arc<Graph>,
    publisher: watch::Sender<Arc<Graph>>,
    events: Vec<GraphEvent>,
}

impl<R: GraphRepository> GraphStore<R> {
    /// Open the store over whatever the repository holds
    pub async fn open(repository: Arc<R>) -> Result<Self> {
        let graph = repository.load().await?;
        debug!(
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "Opened graph store"
        );
        Ok(Self::with_graph(repository, graph))
    }

    /// Open the store, loading the seed dataset if the repository is empty
    pub async fn open_or_seed(repository: Arc<R>) -> Result<Self> {
        let graph = repository.load().await?;
        if !graph.is_empty() {
            return Ok(Self::with_graph(repository, graph));
        }

        let seed = Graph::seed()?;
        repository.save(&seed).await?;
        info!(
            entities = seed.entities.len(),
            relations = seed.relations.len(),
            "Seeded empty graph"
        );

        let event = GraphEvent::seeded(seed.entities.len(), seed.relations.len());
        let mut store = Self::with_graph(repository, seed);
        store.events.push(event);
        Ok(store)
    }

    fn with_graph(repository: Arc<R>, graph: Graph) -> Self {
        let graph = Arc::new(graph);
        let (publisher, _) = watch::channel(Arc::clone(&graph));
        Self {
            repository,
            graph,
            publisher,
            events: Vec::new(),
        }
    }

    /// The committed graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Shared handle to the committed graph
    pub fn snapshot(&self) -> Arc<Graph> {
        Arc::clone(&self.graph)
    }

    /// Receive every committed snapshot from now on
    pub fn subscribe(&self) -> watch::Receiver<Arc<Graph>> {
        self.publisher.subscribe()
    }

    /// Audit trail, oldest first
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Consolidate a batch into the graph, persist, and publish
    ///
    /// If persisting fails the committed graph is left as it was and no
    /// events are recorded.
    pub async fn ingest(&mut self, batch: GraphBatch) -> Result<IngestOutcome> {
        let ingestion_id = Uuid::new_v4();
        let incoming = batch.total_count();

        let consolidation = consolidate_batch(Graph::clone(&self.graph), batch);
        let events = GraphEvent::from_consolidation(ingestion_id, &consolidation);

        let outcome = IngestOutcome {
            ingestion_id,
            merged_count: consolidation.merged_count,
            entities_added: consolidation.added.len(),
            relations_added: consolidation.accepted_relations,
            relations_dropped: consolidation.dropped.len(),
            merges: consolidation.merges.clone(),
            dropped: consolidation.dropped.clone(),
        };

        let next = consolidation.into_graph();
        if let Err(e) = self.repository.save(&next).await {
            warn!(ingestion_id = %ingestion_id, error = %e, "Failed to persist ingestion");
            return Err(e);
        }

        self.commit(next);
        self.events.extend(events);

        info!(
            ingestion_id = %ingestion_id,
            incoming,
            merged = outcome.merged_count,
            entities_added = outcome.entities_added,
            relations_added = outcome.relations_added,
            relations_dropped = outcome.relations_dropped,
            "Batch ingested"
        );

        Ok(outcome)
    }

    /// Generate a batch for `prompt` and ingest it
    pub async fn expand<B>(
        &mut self,
        generator: &GraphGenerator,
        context: &mut ProviderContext,
        backend: &B,
        prompt: &str,
    ) -> Result<IngestOutcome>
    where
        B: CompletionBackend + ?Sized,
    {
        let batch = generator
            .generate(context, backend, prompt, &self.graph)
            .await?;
        self.ingest(batch).await
    }

    /// Store a layout coordinate computed by the renderer
    pub async fn set_position(&mut self, id: &str, position: Position) -> Result<()> {
        let mut next = Graph::clone(&self.graph);
        next.set_position(id, position)?;
        self.repository.save(&next).await?;
        self.commit(next);
        Ok(())
    }

    fn commit(&mut self, graph: Graph) {
        self.graph = Arc::new(graph);
        self.publisher.send_replace(Arc::clone(&self.graph));
    }
}
