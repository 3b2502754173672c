//! Graph relation (edge) types
//!
//! Relation endpoints are a tagged union: a bare entity id, or an embedded
//! entity record. The rendering layer hands relations back with endpoints
//! resolved to full entities, while storage and the generation service use
//! bare ids. [`Endpoint::id`] reads either form.

use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// Weight assigned when the source did not provide a usable one
pub const DEFAULT_WEIGHT: f32 = 0.5;

/// One end of a relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    /// A bare entity id
    Id(String),
    /// An embedded entity record
    Entity(Box<Entity>),
}

impl Endpoint {
    /// The bare entity id, whichever form this endpoint takes
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Entity(entity) => &entity.id,
        }
    }

    /// Whether this endpoint is already a bare id
    pub fn is_bare(&self) -> bool {
        matches!(self, Self::Id(_))
    }
}

impl From<&str> for Endpoint {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Entity> for Endpoint {
    fn from(entity: Entity) -> Self {
        Self::Entity(Box::new(entity))
    }
}

/// A relation between two entities
///
/// Direction is kept for display (`source` -> `target`), but duplicate
/// detection treats the pair as unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: Endpoint,
    pub target: Endpoint,
    /// Free-text predicate label (e.g. "LEADER_OF")
    #[serde(default)]
    pub relation: String,
    /// Strength in `(0, 1]`, drives visual thickness
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    DEFAULT_WEIGHT
}

impl Relation {
    /// Create a new relation with the default weight
    pub fn new(
        source: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            weight: DEFAULT_WEIGHT,
        }
    }

    /// Set the weight (see [`normalize_weight`])
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = normalize_weight(weight);
        self
    }

    /// Bare id of the source endpoint
    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Bare id of the target endpoint
    pub fn target_id(&self) -> &str {
        self.target.id()
    }

    /// Copy of this relation with both endpoints reduced to bare ids
    pub fn detached(&self) -> Self {
        Self {
            source: Endpoint::Id(self.source_id().to_string()),
            target: Endpoint::Id(self.target_id().to_string()),
            relation: self.relation.clone(),
            weight: self.weight,
        }
    }

    /// Whether this relation touches the given entity id
    pub fn touches(&self, entity_id: &str) -> bool {
        self.source_id() == entity_id || self.target_id() == entity_id
    }
}

/// Bring a weight into `(0, 1]`
///
/// Values above 1 are capped; zero, negative, and NaN weights fall back to
/// [`DEFAULT_WEIGHT`].
pub fn normalize_weight(weight: f32) -> f32 {
    if weight > 0.0 {
        weight.min(1.0)
    } else {
        DEFAULT_WEIGHT
    }
}
