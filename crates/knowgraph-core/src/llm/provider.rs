//! Provider fallback context
//!
//! A [`ProviderContext`] owns the ordered list of (provider, model)
//! candidates and their remaining request quota. It is created by the caller
//! and passed into each generation call; nothing here is process-global.
//!
//! Candidate order: every heavy (reasoning) model before any standard model,
//! and within a tier the providers take turns, so the first model of each
//! provider comes before the second model of any provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::types::{LlmResponse, Message};

/// Capability tier of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Reasoning-capable models, preferred for graph generation
    Heavy,
    Standard,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heavy => "heavy",
            Self::Standard => "standard",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (provider, model) pair the context may try
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCandidate {
    pub provider: String,
    pub model: String,
    pub tier: ModelTier,
    /// `None` means unlimited
    pub remaining_quota: Option<u32>,
}

impl ModelCandidate {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            tier,
            remaining_quota: None,
        }
    }

    pub fn with_quota(mut self, quota: u32) -> Self {
        self.remaining_quota = Some(quota);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_quota == Some(0)
    }
}

/// Outcome of a single backend call
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub model: String,
    pub tier: ModelTier,
    pub succeeded: bool,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Transport that performs one completion against one candidate
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, candidate: &ModelCandidate, messages: Vec<Message>)
    -> Result<LlmResponse>;
}

/// Ordered candidates plus quota and attempt bookkeeping
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    candidates: Vec<ModelCandidate>,
    attempts: Vec<AttemptRecord>,
}

impl ProviderContext {
    /// Context over an explicit candidate list, tried in the given order
    pub fn new(candidates: Vec<ModelCandidate>) -> Self {
        Self {
            candidates,
            attempts: Vec::new(),
        }
    }

    /// Build the candidate order from configured providers
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut candidates = Vec::new();

        for tier in [ModelTier::Heavy, ModelTier::Standard] {
            let per_provider: Vec<(&str, &[String], Option<u32>)> = config
                .providers
                .iter()
                .map(|p| {
                    let models = match tier {
                        ModelTier::Heavy => p.heavy_models.as_slice(),
                        ModelTier::Standard => p.standard_models.as_slice(),
                    };
                    (p.name.as_str(), models, p.request_quota)
                })
                .collect();

            let depth = per_provider
                .iter()
                .map(|(_, models, _)| models.len())
                .max()
                .unwrap_or(0);

            for round in 0..depth {
                for (provider, models, quota) in &per_provider {
                    if let Some(model) = models.get(round) {
                        candidates.push(ModelCandidate {
                            provider: provider.to_string(),
                            model: model.clone(),
                            tier,
                            remaining_quota: *quota,
                        });
                    }
                }
            }
        }

        Self::new(candidates)
    }

    pub fn candidates(&self) -> &[ModelCandidate] {
        &self.candidates
    }

    /// Every attempt made through this context, oldest first
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Remaining quota for a pair; `None` when unlimited or unknown
    pub fn remaining_quota(&self, provider: &str, model: &str) -> Option<u32> {
        self.candidates
            .iter()
            .find(|c| c.provider == provider && c.model == model)
            .and_then(|c| c.remaining_quota)
    }

    /// Whether no candidate can be tried any more
    pub fn is_exhausted(&self) -> bool {
        self.candidates.iter().all(ModelCandidate::is_exhausted)
    }

    /// Try candidates in order until one succeeds
    ///
    /// Errors that [`Error::allows_fallback`] rejects abort immediately.
    /// When every candidate fails the last error is returned, or
    /// [`Error::NoSuitableModel`] if nothing could be tried.
    pub async fn run<B>(&mut self, backend: &B, messages: Vec<Message>) -> Result<LlmResponse>
    where
        B: CompletionBackend + ?Sized,
    {
        let mut last_error = None;

        for idx in 0..self.candidates.len() {
            let candidate = self.candidates[idx].clone();
            if candidate.is_exhausted() {
                debug!(
                    provider = %candidate.provider,
                    model = %candidate.model,
                    "Skipping candidate with no remaining quota"
                );
                continue;
            }

            debug!(
                provider = %candidate.provider,
                model = %candidate.model,
                tier = %candidate.tier,
                "Attempting chat completion"
            );

            match backend.complete(&candidate, messages.clone()).await {
                Ok(response) => {
                    if let Some(quota) = self.candidates[idx].remaining_quota.as_mut() {
                        *quota = quota.saturating_sub(1);
                    }
                    self.record(&candidate, None);
                    info!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        tokens = response.tokens_used,
                        "Chat completion successful"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    self.record(&candidate, Some(e.to_string()));
                    if matches!(e, Error::RateLimited(_) | Error::QuotaExhausted { .. }) {
                        self.candidates[idx].remaining_quota = Some(0);
                    }

                    if !e.allows_fallback() {
                        error!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            error = %e,
                            "Non-recoverable error"
                        );
                        return Err(e);
                    }

                    warn!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        error = %e,
                        "Candidate failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::NoSuitableModel("no provider has remaining quota".to_string())
        }))
    }

    fn record(&mut self, candidate: &ModelCandidate, error: Option<String>) {
        self.attempts.push(AttemptRecord {
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            tier: candidate.tier,
            succeeded: error.is_none(),
            error,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProviderConfig};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Backend that fails for listed models and succeeds otherwise
    #[derive(Default)]
    struct Scripted {
        failures: HashMap<String, fn() -> Error>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn fail(mut self, model: &str, err: fn() -> Error) -> Self {
            self.failures.insert(model.to_string(), err);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        async fn complete(
            &self,
            candidate: &ModelCandidate,
            _messages: Vec<Message>,
        ) -> Result<LlmResponse> {
            self.calls.lock().unwrap().push(candidate.model.clone());
            match self.failures.get(&candidate.model) {
                Some(err) => Err(err()),
                None => Ok(LlmResponse::text(&candidate.model, "{}")),
            }
        }
    }

    fn two_providers() -> LlmConfig {
        let mut config = Config::default().llm;
        config.providers = vec![
            ProviderConfig::new("a", "http://a", "A_KEY")
                .with_heavy_models(["a-heavy-1", "a-heavy-2"])
                .with_standard_models(["a-std"]),
            ProviderConfig::new("b", "http://b", "B_KEY")
                .with_heavy_models(["b-heavy"])
                .with_standard_models(["b-std-1", "b-std-2"])
                .with_request_quota(2),
        ];
        config
    }

    #[test]
    fn test_order_is_heavy_first_then_round_robin() {
        let context = ProviderContext::from_config(&two_providers());
        let order: Vec<_> = context
            .candidates()
            .iter()
            .map(|c| c.model.as_str())
            .collect();

        assert_eq!(
            order,
            vec!["a-heavy-1", "b-heavy", "a-heavy-2", "a-std", "b-std-1", "b-std-2"]
        );
        assert_eq!(context.remaining_quota("b", "b-std-2"), Some(2));
        assert_eq!(context.remaining_quota("a", "a-std"), None);
    }

    #[tokio::test]
    async fn test_falls_back_and_records_attempts() {
        let mut context = ProviderContext::from_config(&two_providers());
        let backend = Scripted::default()
            .fail("a-heavy-1", || Error::RateLimited(30))
            .fail("b-heavy", || {
                Error::ProviderUnavailable("b".into(), "missing key".into())
            });

        let response = context.run(&backend, vec![Message::user("hi")]).await.unwrap();

        assert_eq!(response.model, "a-heavy-2");
        assert_eq!(backend.calls(), vec!["a-heavy-1", "b-heavy", "a-heavy-2"]);

        let attempts = context.attempts();
        assert_eq!(attempts.len(), 3);
        assert!(!attempts[0].succeeded);
        assert!(attempts[2].succeeded);
        assert_eq!(context.remaining_quota("a", "a-heavy-1"), Some(0));
    }

    #[tokio::test]
    async fn test_quota_is_decremented_and_respected() {
        let mut context = ProviderContext::new(vec![
            ModelCandidate::new("b", "only", ModelTier::Standard).with_quota(1),
        ]);
        let backend = Scripted::default();

        context.run(&backend, vec![]).await.unwrap();
        assert_eq!(context.remaining_quota("b", "only"), Some(0));
        assert!(context.is_exhausted());

        let err = context.run(&backend, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::NoSuitableModel(_)));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_aborts() {
        let mut context = ProviderContext::from_config(&two_providers());
        let backend =
            Scripted::default().fail("a-heavy-1", || Error::InvalidInput("bad prompt".into()));

        let err = context.run(&backend, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(backend.calls(), vec!["a-heavy-1"]);
    }

    #[tokio::test]
    async fn test_all_failures_return_last_error() {
        let mut context = ProviderContext::new(vec![
            ModelCandidate::new("a", "m1", ModelTier::Heavy),
            ModelCandidate::new("b", "m2", ModelTier::Standard),
        ]);
        let backend = Scripted::default()
            .fail("m1", || Error::LLMError("Model not found".into()))
            .fail("m2", || Error::RateLimited(5));

        let err = context.run(&backend, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(5)));
        assert_eq!(context.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_context() {
        let mut context = ProviderContext::default();
        let err = context.run(&Scripted::default(), vec![]).await.unwrap_err();
        assert!(matches!(err, Error::NoSuitableModel(_)));
    }
}
