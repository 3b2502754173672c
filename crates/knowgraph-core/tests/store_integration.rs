//! Graph store integration tests

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use knowgraph_core::domain::graph::{
    Entity, Graph, GraphBatch, GraphEvent, GraphGenerator, GraphRepository, GraphStats,
    GraphStore, Relation,
};
use knowgraph_core::llm::{
    CompletionBackend, LlmResponse, Message, ModelCandidate, ModelTier, ProviderContext,
};
use knowgraph_core::storage::{JsonlGraphRepository, MemoryGraphRepository};
use knowgraph_core::{Error, Result};
use tempfile::TempDir;

/// Repository whose saves can be switched to fail
#[derive(Default)]
struct FlakyRepository {
    inner: MemoryGraphRepository,
    fail_saves: AtomicBool,
}

#[async_trait]
impl GraphRepository for FlakyRepository {
    async fn load(&self) -> Result<Graph> {
        self.inner.load().await
    }

    async fn save(&self, graph: &Graph) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::StorageError("disk full".to_string()));
        }
        self.inner.save(graph).await
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        self.inner.get_entity(id).await
    }

    async fn stats(&self) -> Result<GraphStats> {
        self.inner.stats().await
    }
}

/// Backend that answers per model from a script
struct ScriptedBackend {
    script: Vec<(&'static str, Result<&'static str>)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(script: Vec<(&'static str, Result<&'static str>)>) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        candidate: &ModelCandidate,
        _messages: Vec<Message>,
    ) -> Result<LlmResponse> {
        self.calls.lock().unwrap().push(candidate.model.clone());
        let entry = self
            .script
            .iter()
            .find(|(model, _)| *model == candidate.model)
            .map(|(_, outcome)| outcome);

        match entry {
            Some(Ok(content)) => Ok(LlmResponse::text(&candidate.model, *content)),
            Some(Err(Error::RateLimited(secs))) => Err(Error::RateLimited(*secs)),
            Some(Err(e)) => Err(Error::ProviderUnavailable(
                candidate.provider.clone(),
                e.to_string(),
            )),
            None => Err(Error::LLMError("Model not found".to_string())),
        }
    }
}

const CASTRO_BATCH: &str = r#"```json
{
    "entities": [
        {"id": "fidel_castro", "label": "Fidel Castro", "type": "Person",
         "category": "Leaders", "aliases": ["Castro"], "significance": 8},
        {"id": "the_usa", "label": "United States", "tags": ["Embargo"]}
    ],
    "relations": [
        {"source": "fidel_castro", "target": "cuba", "relation": "LEADER_OF", "weight": 1.0},
        {"source": "the_usa", "target": "cuba", "relation": "EMBARGOED"},
        {"source": "cuba", "target": "cuban_missile_crisis", "relation": "SITE_OF"}
    ]
}
```"#;

#[tokio::test]
async fn jsonl_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let repo = Arc::new(JsonlGraphRepository::new(temp_dir.path().join("graph")));

    let mut store = GraphStore::open_or_seed(Arc::clone(&repo)).await.unwrap();
    let seeded = store.graph().entities.len();

    let outcome = store
        .ingest(GraphBatch::new(
            vec![Entity::new("fidel_castro", "Fidel Castro")],
            vec![Relation::new("fidel_castro", "cuba", "LEADER_OF")],
        ))
        .await
        .unwrap();
    assert_eq!(outcome.entities_added, 1);

    let reopened = GraphStore::open(repo).await.unwrap();
    assert_eq!(reopened.graph().entities.len(), seeded + 1);
    assert!(reopened.graph().contains("fidel_castro"));
    assert!(
        reopened
            .graph()
            .relations_of("fidel_castro")
            .any(|r| r.target_id() == "cuba")
    );
}

#[tokio::test]
async fn failed_persist_leaves_graph_unchanged() {
    let repo = Arc::new(FlakyRepository::default());
    let mut store = GraphStore::open_or_seed(Arc::clone(&repo)).await.unwrap();
    let mut rx = store.subscribe();
    let before = store.graph().clone();
    let events_before = store.events().len();

    repo.fail_saves.store(true, Ordering::SeqCst);
    let err = store
        .ingest(GraphBatch::new(vec![Entity::new("cuba_libre", "Cuba Libre")], vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StorageError(_)));
    assert_eq!(store.graph(), &before);
    assert_eq!(store.events().len(), events_before);
    assert!(!rx.has_changed().unwrap());

    repo.fail_saves.store(false, Ordering::SeqCst);
    store
        .ingest(GraphBatch::new(vec![Entity::new("cuba_libre", "Cuba Libre")], vec![]))
        .await
        .unwrap();
    assert!(rx.has_changed().unwrap());
}

#[tokio::test]
async fn expand_falls_back_to_next_provider() {
    let repo = Arc::new(MemoryGraphRepository::new());
    let mut store = GraphStore::open_or_seed(repo).await.unwrap();

    let mut context = ProviderContext::new(vec![
        ModelCandidate::new("groq", "reasoner", ModelTier::Heavy).with_quota(5),
        ModelCandidate::new("openrouter", "thinker", ModelTier::Heavy),
        ModelCandidate::new("groq", "chatty", ModelTier::Standard),
    ]);
    let backend = ScriptedBackend::new(vec![
        ("reasoner", Err(Error::RateLimited(30))),
        ("chatty", Ok(CASTRO_BATCH)),
    ]);

    let outcome = store
        .expand(&GraphGenerator::default(), &mut context, &backend, "Cuban Revolution")
        .await
        .unwrap();

    assert_eq!(
        *backend.calls.lock().unwrap(),
        vec!["reasoner", "thinker", "chatty"]
    );
    assert_eq!(context.remaining_quota("groq", "reasoner"), Some(0));
    let attempts = context.attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts[2].succeeded);

    assert_eq!(outcome.merged_count, 1);
    assert_eq!(outcome.entities_added, 1);
    assert_eq!(outcome.relations_added, 2);
    assert_eq!(outcome.relations_dropped, 1);
    assert_eq!(outcome.status_message(), "Consolidated 1 duplicate entities");

    let usa = store.graph().entity("usa").unwrap();
    assert!(usa.tags.contains(&"Embargo".to_string()));
    assert!(!store.graph().contains("the_usa"));

    let ingested: Vec<_> = store
        .events()
        .iter()
        .filter(|e| e.ingestion_id() == Some(outcome.ingestion_id))
        .collect();
    assert!(matches!(
        ingested.last(),
        Some(GraphEvent::BatchIngested { merged_count: 1, .. })
    ));
}

#[tokio::test]
async fn expand_with_no_candidates_leaves_graph_alone() {
    let repo = Arc::new(MemoryGraphRepository::new());
    let mut store = GraphStore::open_or_seed(repo).await.unwrap();
    let before = store.graph().clone();

    let mut context = ProviderContext::new(vec![
        ModelCandidate::new("groq", "reasoner", ModelTier::Heavy).with_quota(0),
    ]);
    let backend = ScriptedBackend::new(vec![]);

    let err = store
        .expand(&GraphGenerator::default(), &mut context, &backend, "anything")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NoSuitableModel(_)));
    assert!(backend.calls.lock().unwrap().is_empty());
    assert_eq!(store.graph(), &before);
}
