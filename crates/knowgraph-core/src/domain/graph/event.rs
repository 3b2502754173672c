//! Domain events for the knowledge graph
//!
//! The graph store records one event per observable change so callers can
//! audit what an ingestion did without diffing snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::consolidation::{Consolidation, DropReason};

/// Events that can occur in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// The store was initialized from the seed dataset
    Seeded {
        entity_count: usize,
        relation_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// A new entity was added
    EntityCreated {
        ingestion_id: Uuid,
        entity_id: String,
        timestamp: DateTime<Utc>,
    },
    /// An incoming entity was folded into an existing one
    EntityMerged {
        ingestion_id: Uuid,
        incoming_entity_id: String,
        canonical_entity_id: String,
        rule: String,
        timestamp: DateTime<Utc>,
    },
    /// A new relation was added
    RelationCreated {
        ingestion_id: Uuid,
        source_entity_id: String,
        target_entity_id: String,
        relation: String,
        timestamp: DateTime<Utc>,
    },
    /// An incoming relation was rejected
    RelationDropped {
        ingestion_id: Uuid,
        source_entity_id: String,
        target_entity_id: String,
        relation: String,
        reason: DropReason,
        timestamp: DateTime<Utc>,
    },
    /// A batch finished ingesting
    BatchIngested {
        ingestion_id: Uuid,
        merged_count: usize,
        entities_added: usize,
        relations_added: usize,
        relations_dropped: usize,
        timestamp: DateTime<Utc>,
    },
}

impl GraphEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Seeded { timestamp, .. }
            | Self::EntityCreated { timestamp, .. }
            | Self::EntityMerged { timestamp, .. }
            | Self::RelationCreated { timestamp, .. }
            | Self::RelationDropped { timestamp, .. }
            | Self::BatchIngested { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Self::Seeded { .. } => "seeded",
            Self::EntityCreated { .. } => "entity_created",
            Self::EntityMerged { .. } => "entity_merged",
            Self::RelationCreated { .. } => "relation_created",
            Self::RelationDropped { .. } => "relation_dropped",
            Self::BatchIngested { .. } => "batch_ingested",
        }
    }

    /// Ingestion this event belongs to, if any
    pub fn ingestion_id(&self) -> Option<Uuid> {
        match self {
            Self::Seeded { .. } => None,
            Self::EntityCreated { ingestion_id, .. }
            | Self::EntityMerged { ingestion_id, .. }
            | Self::RelationCreated { ingestion_id, .. }
            | Self::RelationDropped { ingestion_id, .. }
            | Self::BatchIngested { ingestion_id, .. } => Some(*ingestion_id),
        }
    }

    /// Create a new Seeded event
    pub fn seeded(entity_count: usize, relation_count: usize) -> Self {
        Self::Seeded {
            entity_count,
            relation_count,
            timestamp: Utc::now(),
        }
    }

    /// Events describing one consolidation pass, ending with `BatchIngested`
    ///
    /// Relation events cover only the relations this pass accepted, which
    /// sit at the tail of `consolidation.relations`.
    pub fn from_consolidation(ingestion_id: Uuid, consolidation: &Consolidation) -> Vec<Self> {
        let timestamp = Utc::now();
        let mut events = Vec::new();

        for entity_id in &consolidation.added {
            events.push(Self::EntityCreated {
                ingestion_id,
                entity_id: entity_id.clone(),
                timestamp,
            });
        }

        for merge in &consolidation.merges {
            events.push(Self::EntityMerged {
                ingestion_id,
                incoming_entity_id: merge.incoming_id.clone(),
                canonical_entity_id: merge.canonical_id.clone(),
                rule: merge.rule.as_str().to_string(),
                timestamp,
            });
        }

        let accepted_start = consolidation
            .relations
            .len()
            .saturating_sub(consolidation.accepted_relations);
        for relation in &consolidation.relations[accepted_start..] {
            events.push(Self::RelationCreated {
                ingestion_id,
                source_entity_id: relation.source_id().to_string(),
                target_entity_id: relation.target_id().to_string(),
                relation: relation.relation.clone(),
                timestamp,
            });
        }

        for dropped in &consolidation.dropped {
            events.push(Self::RelationDropped {
                ingestion_id,
                source_entity_id: dropped.source.clone(),
                target_entity_id: dropped.target.clone(),
                relation: dropped.relation.clone(),
                reason: dropped.reason,
                timestamp,
            });
        }

        events.push(Self::BatchIngested {
            ingestion_id,
            merged_count: consolidation.merged_count,
            entities_added: consolidation.added.len(),
            relations_added: consolidation.accepted_relations,
            relations_dropped: consolidation.dropped.len(),
            timestamp,
        });

        events
    }
}
