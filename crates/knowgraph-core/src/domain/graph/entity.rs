//! Graph entity (node) types
//!
//! Entities are created by AI-generated batches or by the seed dataset and are
//! only ever mutated afterwards by consolidation (tag, alias, and
//! significance accumulation) or by the layout component (position).

use serde::{Deserialize, Serialize};

/// Lowest significance an entity can carry
pub const MIN_SIGNIFICANCE: u8 = 1;

/// Highest significance an entity can carry
pub const MAX_SIGNIFICANCE: u8 = 10;

/// Significance assigned when the source did not provide one
pub const DEFAULT_SIGNIFICANCE: u8 = 5;

/// A node in the knowledge graph
///
/// The `id` is the stable external identifier in canonical token form
/// (see [`normalize_id`]). Field names on the wire follow what the generation
/// service and the renderer exchange: `type`, `category` (or `group`), and
/// `significance` (or `val`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical identifier, unique within a graph
    pub id: String,
    /// Human-readable display name
    pub label: String,
    /// Free-text classification (e.g. "Person", "Country")
    #[serde(rename = "type", default)]
    pub entity_type: String,
    /// Group label driving the visual encoding
    #[serde(alias = "group", default)]
    pub category: String,
    /// Free-text description
    #[serde(default)]
    pub summary: String,
    /// Keywords; grows across merges, never shrinks
    #[serde(default)]
    pub tags: Vec<String>,
    /// Alternate names; grows across merges, never shrinks
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Importance score in `[1, 10]`
    #[serde(alias = "val", default = "default_significance")]
    pub significance: u8,
    /// Layout coordinate, owned by the layout component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

fn default_significance() -> u8 {
    DEFAULT_SIGNIFICANCE
}

impl Entity {
    /// Create a new entity with the given id and label
    ///
    /// The id is used as given; callers that accept raw names should pass
    /// them through [`normalize_id`] first.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            entity_type: String::new(),
            category: String::new(),
            summary: String::new(),
            tags: Vec::new(),
            aliases: Vec::new(),
            significance: DEFAULT_SIGNIFICANCE,
            position: None,
        }
    }

    /// Set the type
    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set aliases
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Set significance (clamped to 1-10)
    pub fn with_significance(mut self, significance: u8) -> Self {
        self.significance = significance.clamp(MIN_SIGNIFICANCE, MAX_SIGNIFICANCE);
        self
    }

    /// Add a tag if not already present
    pub fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    /// Add an alias if not already present
    pub fn add_alias(&mut self, alias: &str) {
        if !self.aliases.iter().any(|a| a == alias) {
            self.aliases.push(alias.to_string());
        }
    }

    /// Fold a duplicate's metadata into this entity
    ///
    /// Tags and aliases become the union of both sets (existing order first),
    /// significance becomes the larger of the two, capped at 10. Id, label,
    /// type, category, summary, and position are left as they are.
    pub fn absorb(&mut self, duplicate: &Entity) {
        for tag in &duplicate.tags {
            self.add_tag(tag);
        }
        for alias in &duplicate.aliases {
            self.add_alias(alias);
        }
        self.significance = self
            .significance
            .max(duplicate.significance)
            .min(MAX_SIGNIFICANCE);
    }
}

/// A 2D layout coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Normalize a raw name into the canonical id token form
///
/// Trims, lowercases, and collapses every whitespace run into a single `_`.
pub fn normalize_id(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
