//! HTTP client for OpenAI-compatible chat completion providers
//!
//! One [`LlmClient`] knows every configured provider's endpoint and key. It
//! does not pick models itself; [`ProviderContext`](super::ProviderContext)
//! decides which candidate to try and calls through [`CompletionBackend`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::provider::{CompletionBackend, ModelCandidate};
use super::types::{ChatRequest, ChatResponse, LlmResponse, Message};

/// Maximum number of retry attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound on a single backoff sleep (in milliseconds)
const BACKOFF_MAX_MS: u64 = 30_000;

/// Where and how to reach one provider
#[derive(Clone)]
struct ProviderEndpoint {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
}

/// Chat completion client shared by all providers
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    providers: HashMap<String, ProviderEndpoint>,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("LlmClient")
            .field("providers", &names)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Builder for creating an LlmClient
pub struct LlmClientBuilder {
    providers: HashMap<String, ProviderEndpoint>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            temperature: 0.4,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }

    /// Register a provider endpoint
    ///
    /// A provider without a key stays registered; calls to it fail with
    /// [`Error::ProviderUnavailable`] so the fallback loop moves on.
    pub fn provider(
        mut self,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let name = name.into();
        self.providers.insert(
            name.clone(),
            ProviderEndpoint {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_key,
                api_key_env: format!("{}_API_KEY", name.to_uppercase()),
            },
        );
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(LlmClient {
            http_client,
            providers: self.providers,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

impl LlmClient {
    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Client for every configured provider, keys read from the environment
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .temperature(config.temperature)
            .max_tokens(config.max_tokens)
            .timeout_secs(config.timeout_secs);

        for provider in &config.providers {
            let api_key = provider
                .resolved_api_key()
                .map_err(|e| Error::ConfigError(e.to_string()))?;
            builder = builder.provider(&provider.name, &provider.base_url, api_key);
            if let Some(endpoint) = builder.providers.get_mut(&provider.name) {
                endpoint.api_key_env = provider.api_key_env.clone();
            }
        }

        builder.build()
    }

    /// Whether a provider is registered and has a key
    pub fn is_available(&self, provider: &str) -> bool {
        self.providers
            .get(provider)
            .is_some_and(|p| p.api_key.is_some())
    }

    /// Execute a chat request with retry logic
    async fn execute_request(
        &self,
        endpoint: &ProviderEndpoint,
        provider: &str,
        request: &ChatRequest,
    ) -> Result<LlmResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(endpoint, provider, request).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimited(wait_secs)) if attempts < MAX_RETRY_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(
                        provider = %provider,
                        attempt = attempts,
                        wait_ms = backoff,
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(
        &self,
        endpoint: &ProviderEndpoint,
        provider: &str,
        request: &ChatRequest,
    ) -> Result<LlmResponse> {
        let api_key = endpoint.api_key.as_deref().ok_or_else(|| {
            Error::ProviderUnavailable(
                provider.to_string(),
                format!("{} is not set", endpoint.api_key_env),
            )
        })?;
        let url = format!("{}/chat/completions", endpoint.base_url);

        debug!(
            provider = %provider,
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .header("X-Title", "Knowgraph")
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(provider, status.as_u16(), &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(
        &self,
        candidate: &ModelCandidate,
        messages: Vec<Message>,
    ) -> Result<LlmResponse> {
        let endpoint = self.providers.get(&candidate.provider).ok_or_else(|| {
            Error::ProviderUnavailable(candidate.provider.clone(), "not configured".to_string())
        })?;

        let request = ChatRequest::new(&candidate.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_json_mode();

        self.execute_request(endpoint, &candidate.provider, &request)
            .await
    }
}

/// Map a non-success HTTP status to an error
fn error_for_status(provider: &str, status: u16, body: &str) -> Error {
    match status {
        401 => Error::ProviderUnavailable(
            provider.to_string(),
            "unauthorized, check the API key".to_string(),
        ),
        403 => Error::ProviderUnavailable(provider.to_string(), format!("forbidden: {}", body)),
        429 => {
            let wait_secs = extract_retry_after(body).unwrap_or(60);
            Error::RateLimited(wait_secs)
        }
        400 => Error::LLMError(format!("Bad request: {}", body)),
        402 => Error::QuotaExhausted {
            provider: provider.to_string(),
            model: "*".to_string(),
        },
        404 => Error::LLMError(format!("Model not found or endpoint unavailable: {}", body)),
        500..=599 => Error::LLMError(format!("Server error ({}): {}", status, body)),
        _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32, suggested_wait: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
    let suggested = suggested_wait.saturating_mul(1000);

    let delay = base.max(suggested).min(BACKOFF_MAX_MS);

    // 10% jitter
    let jitter = delay / 10;
    delay + rand::thread_rng().gen_range(0..=jitter)
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::llm::ModelTier;

    #[test]
    fn test_client_builder() {
        let client = LlmClient::builder()
            .provider("groq", "https://api.groq.com/openai/v1/", Some("k".into()))
            .provider("local", "http://localhost:11434/v1", None)
            .timeout_secs(5)
            .build()
            .unwrap();

        assert!(client.is_available("groq"));
        assert!(!client.is_available("local"));
        assert!(!client.is_available("openrouter"));
        assert_eq!(
            client.providers["groq"].base_url,
            "https://api.groq.com/openai/v1"
        );
    }

    #[test]
    fn test_from_config_keeps_env_var_name() {
        let mut config = crate::config::Config::default().llm;
        config.providers = vec![ProviderConfig::new(
            "custom",
            "http://custom",
            "KNOWGRAPH_TEST_UNSET_KEY_VAR",
        )];

        let client = LlmClient::from_config(&config).unwrap();
        assert!(!client.is_available("custom"));
        assert_eq!(
            client.providers["custom"].api_key_env,
            "KNOWGRAPH_TEST_UNSET_KEY_VAR"
        );
    }

    #[test]
    fn test_from_config_rejects_stored_key() {
        let mut config = crate::config::Config::default().llm;
        let mut provider = ProviderConfig::new("custom", "http://custom", "CUSTOM_API_KEY");
        provider.api_key = Some("sk-stored".into());
        config.providers = vec![provider];

        let err = LlmClient::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(err.suggestion().as_deref(), Some("knowgraph config list"));
    }

    #[test]
    fn test_client_debug_hides_keys() {
        let client = LlmClient::builder()
            .provider("groq", "http://g", Some("secret-key".into()))
            .build()
            .unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("groq"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[tokio::test]
    async fn test_missing_key_is_provider_unavailable() {
        let client = LlmClient::builder()
            .provider("groq", "http://127.0.0.1:9", None)
            .build()
            .unwrap();
        let candidate = ModelCandidate::new("groq", "llama", ModelTier::Standard);

        let err = client.complete(&candidate, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(ref p, _) if p == "groq"));
        assert!(err.allows_fallback());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_provider_unavailable() {
        let client = LlmClient::builder().build().unwrap();
        let candidate = ModelCandidate::new("nobody", "m", ModelTier::Heavy);

        let err = client.complete(&candidate, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(..)));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status("groq", 401, ""),
            Error::ProviderUnavailable(..)
        ));
        assert!(matches!(
            error_for_status("groq", 403, "nope"),
            Error::ProviderUnavailable(..)
        ));
        assert!(matches!(
            error_for_status("groq", 429, r#"{"retry_after": 7}"#),
            Error::RateLimited(7)
        ));
        assert!(matches!(
            error_for_status("groq", 429, "slow down"),
            Error::RateLimited(60)
        ));

        let not_found = error_for_status("groq", 404, "");
        assert!(matches!(not_found, Error::LLMError(_)));
        assert!(not_found.allows_fallback());

        let server = error_for_status("groq", 503, "overloaded");
        assert!(server.allows_fallback());

        assert!(!error_for_status("groq", 400, "bad").allows_fallback());
    }

    #[test]
    fn test_calculate_backoff() {
        let backoff1 = calculate_backoff(1, 0);
        assert!((BACKOFF_BASE_MS..=BACKOFF_BASE_MS + BACKOFF_BASE_MS / 10).contains(&backoff1));

        let backoff2 = calculate_backoff(2, 0);
        assert!(backoff2 >= BACKOFF_BASE_MS * 2);

        assert!(calculate_backoff(1, 5) >= 5000);
        assert!(calculate_backoff(1, 3600) <= BACKOFF_MAX_MS + BACKOFF_MAX_MS / 10);
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 30}"#), Some(30));
        assert_eq!(
            extract_retry_after(r#"{"error": {"retry_after": 60}}"#),
            Some(60)
        );
        assert_eq!(extract_retry_after(r#"{"message": "rate limited"}"#), None);
        assert_eq!(extract_retry_after("not json"), None);
    }
}
