//! Knowledge graph domain
//!
//! This module owns the graph model and the consolidation engine that keeps
//! it free of duplicates as AI-generated batches arrive:
//!
//! - **Similarity**: bigram overlap between two strings
//! - **Resolver**: decides whether two entity records are the same thing
//! - **Consolidation**: merges a batch into a graph and filters its edges
//! - **Store**: holds the canonical graph, persists, and republishes it
//!
//! # Example
//!
//! ```
//! use knowgraph_core::domain::graph::{Entity, Relation, consolidate};
//!
//! let existing = vec![Entity::new("usa", "United States")];
//! let incoming = vec![
//!     Entity::new("united_states", "united states"),
//!     Entity::new("cuba", "Cuba"),
//! ];
//! let relations = vec![Relation::new("united_states", "cuba", "EMBARGOED")];
//!
//! let result = consolidate(existing, vec![], incoming, relations);
//! assert_eq!(result.merged_count, 1);
//! assert_eq!(result.relations[0].source_id(), "usa");
//! ```

mod consolidation;
mod entity;
mod event;
mod generator;
mod relation;
mod render;
mod repository;
mod resolver;
mod service;
mod similarity;
mod snapshot;

pub use consolidation::{
    Consolidation, DropReason, DroppedRelation, EntityMerge, consolidate, consolidate_batch,
};
pub use entity::{
    DEFAULT_SIGNIFICANCE, Entity, MAX_SIGNIFICANCE, MIN_SIGNIFICANCE, Position, normalize_id,
};
pub use event::GraphEvent;
pub use generator::GraphGenerator;
pub use relation::{DEFAULT_WEIGHT, Endpoint, Relation, normalize_weight};
pub use render::{RenderEdge, RenderGraph};
pub use repository::GraphRepository;
pub use resolver::{
    ALIAS_SIMILARITY_THRESHOLD, LABEL_SIMILARITY_THRESHOLD, MatchRule, match_rule, same_entity,
};
pub use service::{GraphStore, IngestOutcome};
pub use similarity::{normalize, similarity};
pub use snapshot::{Graph, GraphBatch, GraphStats};
