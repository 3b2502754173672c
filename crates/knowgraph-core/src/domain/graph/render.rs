//! Render-bound view of a graph
//!
//! Stored relations name their endpoints by id. A layout engine wants direct
//! handles instead, so [`RenderGraph::bind`] resolves every relation once into
//! index pairs over the entity slice. The view borrows the graph; positions
//! computed by the layout go back through [`Graph::set_position`].

use std::collections::HashMap;

use super::entity::Entity;
use super::snapshot::Graph;

/// An edge whose endpoints are indices into [`RenderGraph::nodes`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderEdge<'g> {
    pub source: usize,
    pub target: usize,
    pub relation: &'g str,
    pub weight: f32,
}

/// A graph with relations resolved to node indices
#[derive(Debug)]
pub struct RenderGraph<'g> {
    pub nodes: &'g [Entity],
    pub edges: Vec<RenderEdge<'g>>,
    index: HashMap<&'g str, usize>,
}

impl<'g> RenderGraph<'g> {
    /// Resolve every relation of `graph` into node indices
    ///
    /// Relations naming an id that is not in the graph are left out.
    pub fn bind(graph: &'g Graph) -> Self {
        let index: HashMap<&str, usize> = graph
            .entities
            .iter()
            .enumerate()
            .map(|(idx, entity)| (entity.id.as_str(), idx))
            .collect();

        let edges = graph
            .relations
            .iter()
            .filter_map(|relation| {
                let source = *index.get(relation.source_id())?;
                let target = *index.get(relation.target_id())?;
                Some(RenderEdge {
                    source,
                    target,
                    relation: relation.relation.as_str(),
                    weight: relation.weight,
                })
            })
            .collect();

        Self {
            nodes: &graph.entities,
            edges,
            index,
        }
    }

    /// Node index for an entity id
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// The two entities an edge connects
    pub fn endpoints(&self, edge: &RenderEdge<'g>) -> (&'g Entity, &'g Entity) {
        (&self.nodes[edge.source], &self.nodes[edge.target])
    }

    /// Number of edges touching a node
    pub fn degree(&self, node: usize) -> usize {
        self.edges
            .iter()
            .filter(|e| e.source == node || e.target == node)
            .count()
    }
}
