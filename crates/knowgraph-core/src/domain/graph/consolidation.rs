//! Graph consolidation engine
//!
//! Merges a freshly generated batch of entities and relations into an
//! existing graph without introducing duplicate entities, duplicate edges
//! (in either direction), self-loops, or dangling edges.
//!
//! The computation is synchronous and performs no I/O. It takes ownership of
//! the existing entity list for the duration of the call, mutates merged
//! entities in place, and hands the list back in the result. Calls are not
//! commutative, so a caller must serialize them against a given graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entity::Entity;
use super::relation::{Endpoint, Relation};
use super::resolver::{MatchRule, match_rule};
use super::snapshot::{Graph, GraphBatch};

/// Outcome of a consolidation pass
#[derive(Debug, Clone)]
pub struct Consolidation {
    /// Existing entities (merged in place) followed by newly added ones
    pub entities: Vec<Entity>,
    /// Existing relations, untouched, followed by accepted new ones
    pub relations: Vec<Relation>,
    /// Number of incoming entities folded into an already present entity
    pub merged_count: usize,
    /// Every merge, in input order
    pub merges: Vec<EntityMerge>,
    /// Ids of incoming entities appended as new, in input order
    pub added: Vec<String>,
    /// Number of incoming relations accepted
    pub accepted_relations: usize,
    /// Every rejected incoming relation, in input order
    pub dropped: Vec<DroppedRelation>,
}

impl Consolidation {
    /// The consolidated graph, dropping the report
    pub fn into_graph(self) -> Graph {
        Graph {
            entities: self.entities,
            relations: self.relations,
        }
    }
}

/// An incoming entity resolved onto an entity already in the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMerge {
    /// Id the entity arrived with
    pub incoming_id: String,
    /// Id of the entity it was folded into
    pub canonical_id: String,
    /// Rule that matched
    #[serde(serialize_with = "serialize_rule")]
    pub rule: MatchRule,
}

fn serialize_rule<S: serde::Serializer>(rule: &MatchRule, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(rule.as_str())
}

/// An incoming relation that was not added
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRelation {
    /// Source id as it arrived
    pub source: String,
    /// Target id as it arrived
    pub target: String,
    /// Predicate label
    pub relation: String,
    /// Why it was dropped
    pub reason: DropReason,
}

/// Why an incoming relation was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// An endpoint references no entity in the graph or the batch
    UnresolvedEndpoint,
    /// Both endpoints resolve to the same entity
    SelfLoop,
    /// The unordered endpoint pair is already connected
    Duplicate,
}

impl DropReason {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedEndpoint => "unresolved_endpoint",
            Self::SelfLoop => "self_loop",
            Self::Duplicate => "duplicate",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Merge an incoming batch into an existing graph
///
/// 1. Each incoming entity, in order, is compared against the current entity
///    list (including entities appended earlier in this batch). The first
///    match absorbs its tags, aliases, and significance; otherwise the entity
///    is appended unchanged.
/// 2. Each incoming relation, in order, has its endpoints resolved to
///    canonical ids. Relations with an endpoint that resolves to nothing,
///    self-loops, and relations whose unordered pair is already connected are
///    dropped. Accepted relations carry bare canonical ids.
///
/// Existing relations are returned untouched, ahead of accepted ones. This
/// function never fails.
pub fn consolidate(
    existing_entities: Vec<Entity>,
    existing_relations: Vec<Relation>,
    incoming_entities: Vec<Entity>,
    incoming_relations: Vec<Relation>,
) -> Consolidation {
    let mut entities = existing_entities;
    let mut resolved: HashMap<String, String> = HashMap::new();
    let mut merges = Vec::new();
    let mut added = Vec::new();

    for incoming in incoming_entities {
        let found = entities
            .iter()
            .enumerate()
            .find_map(|(idx, candidate)| match_rule(candidate, &incoming).map(|rule| (idx, rule)));

        match found {
            Some((idx, rule)) => {
                let canonical = &mut entities[idx];
                canonical.absorb(&incoming);

                debug!(
                    incoming_id = %incoming.id,
                    canonical_id = %canonical.id,
                    rule = %rule,
                    "Merged incoming entity"
                );

                resolved.insert(incoming.id.clone(), canonical.id.clone());
                merges.push(EntityMerge {
                    incoming_id: incoming.id,
                    canonical_id: canonical.id.clone(),
                    rule,
                });
            }
            None => {
                resolved.insert(incoming.id.clone(), incoming.id.clone());
                added.push(incoming.id.clone());
                entities.push(incoming);
            }
        }
    }

    let known: HashSet<String> = entities.iter().map(|e| e.id.clone()).collect();
    let resolve = |id: &str| -> Option<String> {
        resolved
            .get(id)
            .cloned()
            .or_else(|| known.contains(id).then(|| id.to_string()))
    };

    let mut signatures: HashSet<(String, String)> = existing_relations
        .iter()
        .map(|r| (r.source_id().to_string(), r.target_id().to_string()))
        .collect();

    let mut accepted = Vec::new();
    let mut dropped = Vec::new();

    for relation in incoming_relations {
        let endpoints = resolve(relation.source_id()).zip(resolve(relation.target_id()));

        let reason = match &endpoints {
            None => Some(DropReason::UnresolvedEndpoint),
            Some((source, target)) if source == target => Some(DropReason::SelfLoop),
            Some((source, target))
                if signatures.contains(&(source.clone(), target.clone()))
                    || signatures.contains(&(target.clone(), source.clone())) =>
            {
                Some(DropReason::Duplicate)
            }
            Some(_) => None,
        };

        if let Some(reason) = reason {
            debug!(
                source = %relation.source_id(),
                target = %relation.target_id(),
                relation = %relation.relation,
                reason = %reason,
                "Dropped incoming relation"
            );
            dropped.push(DroppedRelation {
                source: relation.source_id().to_string(),
                target: relation.target_id().to_string(),
                relation: relation.relation,
                reason,
            });
            continue;
        }

        if let Some((source, target)) = endpoints {
            signatures.insert((source.clone(), target.clone()));
            accepted.push(Relation {
                source: Endpoint::Id(source),
                target: Endpoint::Id(target),
                relation: relation.relation,
                weight: relation.weight,
            });
        }
    }

    let merged_count = merges.len();
    let accepted_relations = accepted.len();

    let mut relations = existing_relations;
    relations.extend(accepted);

    Consolidation {
        entities,
        relations,
        merged_count,
        merges,
        added,
        accepted_relations,
        dropped,
    }
}

/// Merge a batch into a graph snapshot
pub fn consolidate_batch(graph: Graph, batch: GraphBatch) -> Consolidation {
    consolidate(graph.entities, graph.relations, batch.entities, batch.relations)
}
