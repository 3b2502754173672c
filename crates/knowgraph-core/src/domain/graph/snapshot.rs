//! Graph snapshots and ingestion batches

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::entity::{Entity, MAX_SIGNIFICANCE, MIN_SIGNIFICANCE, Position, normalize_id};
use super::relation::{Endpoint, Relation, normalize_weight};

/// Seed dataset loaded into an empty store
const SEED_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/seed.json"));

/// A complete graph snapshot
///
/// Input accepts the renderer's `nodes`/`links` naming as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(alias = "nodes", default)]
    pub entities: Vec<Entity>,
    #[serde(alias = "links", alias = "edges", default)]
    pub relations: Vec<Relation>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in seed dataset
    pub fn seed() -> Result<Self> {
        serde_json::from_str(SEED_JSON)
            .map_err(|e| Error::StorageError(format!("Invalid seed dataset: {}", e)))
    }

    /// Parse a graph from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the graph has no entities and no relations
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Look up an entity by id
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Whether an entity with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.entity(id).is_some()
    }

    /// Relations touching the given entity
    pub fn relations_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.touches(id))
    }

    /// Record a layout coordinate for an entity
    pub fn set_position(&mut self, id: &str, position: Position) -> Result<()> {
        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))?;
        entity.position = Some(position);
        Ok(())
    }

    /// Copy of this graph with every relation reduced to bare ids
    pub fn detached(&self) -> Self {
        Self {
            entities: self.entities.clone(),
            relations: self.relations.iter().map(Relation::detached).collect(),
        }
    }

    /// Summary counts
    pub fn stats(&self) -> GraphStats {
        let mut by_category: BTreeMap<String, u64> = BTreeMap::new();
        for entity in &self.entities {
            *by_category.entry(entity.category.clone()).or_default() += 1;
        }

        GraphStats {
            entity_count: self.entities.len() as u64,
            relation_count: self.relations.len() as u64,
            by_category,
        }
    }
}

/// Statistics about a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: u64,
    pub relation_count: u64,
    /// Entity counts keyed by category
    pub by_category: BTreeMap<String, u64>,
}

/// A batch of candidate entities and relations from the generation service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphBatch {
    #[serde(alias = "nodes", default)]
    pub entities: Vec<Entity>,
    #[serde(alias = "links", alias = "edges", default)]
    pub relations: Vec<Relation>,
}

impl GraphBatch {
    /// Create a batch
    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        Self {
            entities,
            relations,
        }
    }

    /// Parse a batch from JSON and bring it into canonical form
    ///
    /// See [`GraphBatch::normalized`].
    pub fn from_json(json: &str) -> Result<Self> {
        let batch: Self = serde_json::from_str(json)?;
        Ok(batch.normalized())
    }

    /// Canonical ids, significance in `[1, 10]`, weights in `(0, 1]`
    ///
    /// Entity ids fall back to the normalized label; entities left without
    /// an id are dropped. Relation endpoints are reduced to normalized bare
    /// ids.
    pub fn normalized(self) -> Self {
        let entities = self
            .entities
            .into_iter()
            .filter_map(|mut entity| {
                let mut id = normalize_id(&entity.id);
                if id.is_empty() {
                    id = normalize_id(&entity.label);
                }
                if id.is_empty() {
                    return None;
                }
                entity.id = id;
                entity.significance = entity
                    .significance
                    .clamp(MIN_SIGNIFICANCE, MAX_SIGNIFICANCE);
                Some(entity)
            })
            .collect();

        let relations = self
            .relations
            .into_iter()
            .map(|relation| Relation {
                source: Endpoint::Id(normalize_id(relation.source_id())),
                target: Endpoint::Id(normalize_id(relation.target_id())),
                weight: normalize_weight(relation.weight),
                relation: relation.relation,
            })
            .collect();

        Self {
            entities,
            relations,
        }
    }

    /// Whether the batch carries nothing
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Get total count of candidate items
    pub fn total_count(&self) -> usize {
        self.entities.len() + self.relations.len()
    }
}

impl From<Graph> for GraphBatch {
    fn from(graph: Graph) -> Self {
        Self {
            entities: graph.entities,
            relations: graph.relations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_valid() {
        let graph = Graph::seed().unwrap();
        assert!(!graph.entities.is_empty());
        assert!(!graph.relations.is_empty());

        for relation in &graph.relations {
            assert!(graph.contains(relation.source_id()));
            assert!(graph.contains(relation.target_id()));
        }
    }

    #[test]
    fn test_renderer_naming_is_accepted() {
        let json = r#"{
            "nodes": [{"id": "usa", "label": "USA", "group": "Nations"}],
            "links": [{"source": "usa", "target": {"id": "usa", "label": "USA"}, "relation": "X"}]
        }"#;
        let graph = Graph::from_json(json).unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.relations.len(), 1);

        let detached = graph.detached();
        assert!(detached.relations[0].target.is_bare());
    }

    #[test]
    fn test_set_position() {
        let mut graph = Graph::new();
        graph.entities.push(Entity::new("usa", "USA"));

        graph.set_position("usa", Position::new(1.0, -2.5)).unwrap();
        assert_eq!(
            graph.entity("usa").unwrap().position,
            Some(Position::new(1.0, -2.5))
        );

        let err = graph.set_position("ussr", Position::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(id) if id == "ussr"));
    }

    #[test]
    fn test_stats() {
        let graph = Graph {
            entities: vec![
                Entity::new("usa", "USA").with_category("Nations"),
                Entity::new("cuba", "Cuba").with_category("Nations"),
                Entity::new("jfk", "JFK").with_category("Leaders"),
            ],
            relations: vec![Relation::new("jfk", "usa", "LEADER_OF")],
        };

        let stats = graph.stats();
        assert_eq!(stats.entity_count, 3);
        assert_eq!(stats.relation_count, 1);
        assert_eq!(stats.by_category["Nations"], 2);
        assert_eq!(stats.by_category["Leaders"], 1);
    }

    #[test]
    fn test_relations_of() {
        let graph = Graph {
            entities: vec![],
            relations: vec![
                Relation::new("jfk", "usa", "LEADER_OF"),
                Relation::new("usa", "cuba", "EMBARGOED"),
                Relation::new("ussr", "cuba", "ALLIED_WITH"),
            ],
        };
        assert_eq!(graph.relations_of("usa").count(), 2);
        assert_eq!(graph.relations_of("jfk").count(), 1);
    }

    #[test]
    fn test_batch_from_json() {
        let batch = GraphBatch::from_json(r#"{"entities": [], "relations": []}"#).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.total_count(), 0);

        assert!(GraphBatch::from_json("not json").is_err());
    }

    #[test]
    fn test_batch_from_json_is_normalized() {
        let json = r#"{
            "entities": [
                {"id": "Berlin Wall", "label": "Berlin Wall", "val": 0},
                {"id": "cuba2", "label": "Cuba", "significance": 200},
                {"id": "  ", "label": "Checkpoint Charlie"},
                {"id": "", "label": "   "}
            ],
            "relations": [
                {"source": "Berlin Wall", "target": {"id": "cuba2", "label": "Cuba"},
                 "relation": "NEAR", "weight": 0.0},
                {"source": "cuba2", "target": "checkpoint_charlie",
                 "relation": "FAR", "weight": 7.5}
            ]
        }"#;

        let batch = GraphBatch::from_json(json).unwrap();

        let ids: Vec<&str> = batch.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["berlin_wall", "cuba2", "checkpoint_charlie"]);
        assert_eq!(batch.entities[0].significance, MIN_SIGNIFICANCE);
        assert_eq!(batch.entities[1].significance, MAX_SIGNIFICANCE);

        let first = &batch.relations[0];
        assert_eq!(first.source_id(), "berlin_wall");
        assert!(first.target.is_bare());
        assert_eq!(first.weight, normalize_weight(0.0));
        assert!(first.weight > 0.0 && first.weight <= 1.0);
        assert_eq!(batch.relations[1].weight, 1.0);
    }
}
