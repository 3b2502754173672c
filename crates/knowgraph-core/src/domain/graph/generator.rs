//! Graph expansion through the AI generation service
//!
//! The generator turns a free-text topic into a [`GraphBatch`]. It asks the
//! model for JSON, tolerates the usual ways models wrap or misname fields,
//! and normalizes everything into the canonical entity and relation shapes.
//! Consolidation against the existing graph happens later, in the store.

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::llm::{CompletionBackend, Message, ProviderContext};

use super::entity::{DEFAULT_SIGNIFICANCE, Entity, MAX_SIGNIFICANCE, MIN_SIGNIFICANCE, normalize_id};
use super::relation::{DEFAULT_WEIGHT, Relation};
use super::snapshot::{Graph, GraphBatch};

/// How many existing entity ids are listed in the prompt
const MAX_KNOWN_IN_PROMPT: usize = 200;

/// Predicate used when the model leaves one out
const FALLBACK_RELATION: &str = "RELATED_TO";

/// Produces candidate batches from a prompt
#[derive(Debug, Clone)]
pub struct GraphGenerator {
    max_entities: usize,
    max_relations: usize,
}

impl Default for GraphGenerator {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

impl GraphGenerator {
    pub fn new(max_entities: usize, max_relations: usize) -> Self {
        Self {
            max_entities,
            max_relations,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.max_entities, config.max_relations)
    }

    /// Ask the model for a batch about `prompt`
    ///
    /// Known entities are listed in the prompt so the model can link new
    /// entities to them by id.
    pub async fn generate<B>(
        &self,
        context: &mut ProviderContext,
        backend: &B,
        prompt: &str,
        known: &Graph,
    ) -> Result<GraphBatch>
    where
        B: CompletionBackend + ?Sized,
    {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        info!(prompt = %prompt, known = known.entities.len(), "Generating graph batch");

        let messages = self.build_messages(prompt, known);
        let response = context.run(backend, messages).await?;
        let batch = self.parse_batch(&response.content)?;

        info!(
            model = %response.model,
            entity_count = batch.entities.len(),
            relation_count = batch.relations.len(),
            "Graph batch generated"
        );

        Ok(batch)
    }

    /// Messages sent for a generation request
    pub fn build_messages(&self, prompt: &str, known: &Graph) -> Vec<Message> {
        let known_ids = if known.entities.is_empty() {
            "(none)".to_string()
        } else {
            known
                .entities
                .iter()
                .take(MAX_KNOWN_IN_PROMPT)
                .map(|e| format!("- {} ({})", e.id, e.label))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user = format!(
            r#"Expand the knowledge graph around this topic: {prompt}

EXISTING ENTITIES (link to these ids instead of recreating them):
{known_ids}

Return at most {max_entities} new entities and {max_relations} relations as JSON:
{{
    "entities": [
        {{
            "id": "lowercase_snake_case_id",
            "label": "Display Name",
            "type": "Person|Country|Event|Organization|Place|Concept",
            "category": "group used for coloring",
            "summary": "one or two sentences",
            "tags": ["keyword"],
            "aliases": ["alternate names, abbreviations"],
            "significance": 5
        }}
    ],
    "relations": [
        {{
            "source": "entity id",
            "target": "entity id",
            "relation": "UPPER_SNAKE_CASE_PREDICATE",
            "weight": 0.5
        }}
    ]
}}"#,
            max_entities = self.max_entities,
            max_relations = self.max_relations,
        );

        vec![Message::system(GENERATION_SYSTEM_PROMPT), Message::user(user)]
    }

    /// Parse a model response into a normalized batch
    pub fn parse_batch(&self, response: &str) -> Result<GraphBatch> {
        let json_str = extract_json_from_response(response);

        let raw: RawBatch = serde_json::from_str(&json_str).map_err(|e| {
            warn!(error = %e, "Failed to parse generation response as JSON");
            Error::GenerationFailed(format!("Invalid response: {}", e))
        })?;

        let entities: Vec<Entity> = raw
            .entities
            .into_iter()
            .filter_map(RawEntity::into_entity)
            .take(self.max_entities)
            .collect();

        let relations: Vec<Relation> = raw
            .relations
            .into_iter()
            .filter_map(RawRelation::into_relation)
            .take(self.max_relations)
            .collect();

        Ok(GraphBatch::new(entities, relations))
    }
}

/// Response structure from the model
#[derive(Debug, Deserialize)]
struct RawBatch {
    #[serde(default, alias = "nodes")]
    entities: Vec<RawEntity>,
    #[serde(default, alias = "links", alias = "edges", alias = "relationships")]
    relations: Vec<RawRelation>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    id: Option<String>,
    #[serde(alias = "name")]
    label: Option<String>,
    #[serde(rename = "type", default)]
    entity_type: Option<String>,
    #[serde(alias = "group", default)]
    category: Option<String>,
    #[serde(alias = "description", default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(alias = "val", default)]
    significance: Option<f64>,
}

impl RawEntity {
    fn into_entity(self) -> Option<Entity> {
        let label = self
            .label
            .filter(|l| !l.trim().is_empty())
            .or_else(|| self.id.clone())?;
        let id = normalize_id(self.id.as_deref().unwrap_or(&label));
        if id.is_empty() {
            return None;
        }

        Some(
            Entity::new(id, label.trim())
                .with_type(self.entity_type.unwrap_or_default())
                .with_category(self.category.unwrap_or_default())
                .with_summary(self.summary.unwrap_or_default())
                .with_tags(self.tags)
                .with_aliases(self.aliases)
                .with_significance(clamp_significance(self.significance)),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    source: RawEndpoint,
    target: RawEndpoint,
    #[serde(alias = "type", alias = "label", default)]
    relation: Option<String>,
    #[serde(default)]
    weight: Option<f32>,
}

/// Endpoint as the model may write it: an id or an object with one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEndpoint {
    Id(String),
    Object { id: String },
}

impl RawEndpoint {
    fn into_id(self) -> String {
        match self {
            Self::Id(id) | Self::Object { id } => normalize_id(&id),
        }
    }
}

impl RawRelation {
    fn into_relation(self) -> Option<Relation> {
        let source = self.source.into_id();
        let target = self.target.into_id();
        if source.is_empty() || target.is_empty() {
            return None;
        }

        let relation = self
            .relation
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| FALLBACK_RELATION.to_string());

        Some(
            Relation::new(source, target, relation)
                .with_weight(self.weight.unwrap_or(DEFAULT_WEIGHT)),
        )
    }
}

fn clamp_significance(value: Option<f64>) -> u8 {
    match value {
        Some(v) if v.is_finite() => {
            v.round()
                .clamp(f64::from(MIN_SIGNIFICANCE), f64::from(MAX_SIGNIFICANCE)) as u8
        }
        _ => DEFAULT_SIGNIFICANCE,
    }
}

/// System prompt for graph generation
const GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert at building knowledge graphs of historical and geopolitical entities.

Your task is to propose entities connected to a topic and the relations between them.

Guidelines:
1. Prefer well-known, specific entities over generic ones
2. Reuse the ids of existing entities when you mean the same thing
3. List common abbreviations and alternate names as aliases
4. Use significance 1-10 for how central the entity is to the topic
5. Use weight 0-1 for how strong the relation is

Return valid JSON only, with no additional text or explanation."#;

/// Extract JSON from a response that might contain markdown or other text
fn extract_json_from_response(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                return response[json_start..json_start + end].trim().to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            return response[start..=end].to_string();
        }
    }

    response.to_string()
}
