//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Knowgraph configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Providers in preference order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// One OpenAI-compatible provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Reasoning-capable models, tried before any standard model
    #[serde(default)]
    pub heavy_models: Vec<String>,
    #[serde(default)]
    pub standard_models: Vec<String>,
    /// Remaining requests per model; unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_quota: Option<u32>,
    /// Only present when a config file tried to store a key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_entities: usize,
    pub max_relations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                temperature: 0.4,
                max_tokens: 4096,
                timeout_secs: 120,
                providers: vec![
                    ProviderConfig::new("groq", "https://api.groq.com/openai/v1", "GROQ_API_KEY")
                        .with_heavy_models(["deepseek-r1-distill-llama-70b"])
                        .with_standard_models(["llama-3.3-70b-versatile"]),
                    ProviderConfig::new(
                        "openrouter",
                        "https://openrouter.ai/api/v1",
                        "OPENROUTER_API_KEY",
                    )
                    .with_heavy_models(["deepseek/deepseek-r1"])
                    .with_standard_models(["meta-llama/llama-3.3-70b-instruct"]),
                ],
            },
            generation: GenerationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_entities: 12,
            max_relations: 24,
        }
    }
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key_env: api_key_env.into(),
            heavy_models: Vec::new(),
            standard_models: Vec::new(),
            request_quota: None,
            api_key: None,
        }
    }

    pub fn with_heavy_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.heavy_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_standard_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.standard_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_quota(mut self, quota: u32) -> Self {
        self.request_quota = Some(quota);
        self
    }

    /// Read the API key from this provider's environment variable
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "API key for provider '{}' must be provided via the {} environment variable, not stored in configuration",
                self.name,
                self.api_key_env
            ));
        }
        Ok(())
    }
}

impl LlmConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    fn provider_mut(&mut self, name: &str) -> anyhow::Result<&mut ProviderConfig> {
        self.providers
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow!("Unknown provider: {}", name))
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("KNOWGRAPH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("knowgraph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for provider in &self.llm.providers {
            provider.enforce_env_only()?;
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if self.generation.max_entities == 0 || self.generation.max_relations == 0 {
            return Err(anyhow!("Generation caps must be positive"));
        }
        Ok(())
    }

    /// Directory holding the persisted graph
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        if let Ok(custom_dir) = env::var("KNOWGRAPH_DATA_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("knowgraph"))
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),
            "llm.providers" => Ok(self
                .llm
                .providers
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")),

            "generation.max_entities" => Ok(self.generation.max_entities.to_string()),
            "generation.max_relations" => Ok(self.generation.max_relations.to_string()),

            "storage.data_dir" => Ok(self.data_dir()?.display().to_string()),

            _ => {
                if let Some((name, field)) = split_provider_key(key) {
                    let provider = self
                        .llm
                        .provider(name)
                        .ok_or_else(|| anyhow!("Unknown provider: {}", name))?;
                    return provider_get(provider, field);
                }
                Err(unknown_key(key))
            }
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = parse_positive(value, "max_tokens")?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = parse_positive(value, "timeout_secs")? as u64;
            }
            "llm.providers" => {
                return Err(anyhow!(
                    "Providers are edited per field, e.g. llm.providers.groq.request_quota"
                ));
            }

            "generation.max_entities" => {
                self.generation.max_entities = parse_positive(value, "max_entities")?;
            }
            "generation.max_relations" => {
                self.generation.max_relations = parse_positive(value, "max_relations")?;
            }

            "storage.data_dir" => {
                self.storage.data_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            _ => {
                let Some((name, field)) = split_provider_key(key) else {
                    return Err(unknown_key(key));
                };
                let provider = self.llm.provider_mut(name)?;
                provider_set(provider, field, value)?;
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut keys: Vec<String> = [
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.providers",
            "generation.max_entities",
            "generation.max_relations",
            "storage.data_dir",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        for provider in &self.llm.providers {
            for field in PROVIDER_FIELDS {
                keys.push(format!("llm.providers.{}.{}", provider.name, field));
            }
        }

        keys.into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

const PROVIDER_FIELDS: [&str; 6] = [
    "base_url",
    "api_key_env",
    "heavy_models",
    "standard_models",
    "request_quota",
    "api_key",
];

fn split_provider_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("llm.providers.")?;
    rest.rsplit_once('.')
}

fn provider_get(provider: &ProviderConfig, field: &str) -> anyhow::Result<String> {
    match field {
        "base_url" => Ok(provider.base_url.clone()),
        "api_key_env" => Ok(provider.api_key_env.clone()),
        "heavy_models" => Ok(provider.heavy_models.join(", ")),
        "standard_models" => Ok(provider.standard_models.join(", ")),
        "request_quota" => Ok(provider
            .request_quota
            .map(|q| q.to_string())
            .unwrap_or_else(|| "unlimited".to_string())),
        "api_key" => match provider.redacted_api_key()? {
            Some(redacted) => Ok(redacted),
            None => Ok(format!("(not set - use {} env var)", provider.api_key_env)),
        },
        _ => Err(anyhow!("Unknown provider field: {}", field)),
    }
}

fn provider_set(provider: &mut ProviderConfig, field: &str, value: &str) -> anyhow::Result<()> {
    match field {
        "base_url" => provider.base_url = value.trim_end_matches('/').to_string(),
        "api_key_env" => provider.api_key_env = value.to_string(),
        "heavy_models" => provider.heavy_models = split_list(value),
        "standard_models" => provider.standard_models = split_list(value),
        "request_quota" => {
            provider.request_quota = if value == "unlimited" || value.is_empty() {
                None
            } else {
                Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid request_quota value: {}", value))?,
                )
            };
        }
        "api_key" => {
            return Err(anyhow!(
                "API keys cannot be stored in configuration for security. \
                 Set the {} environment variable instead.",
                provider.api_key_env
            ));
        }
        _ => return Err(anyhow!("Unknown provider field: {}", field)),
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_positive(value: &str, name: &str) -> anyhow::Result<usize> {
    let parsed: usize = value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", name, value))?;
    if parsed == 0 {
        return Err(anyhow!("{} must be positive", name));
    }
    Ok(parsed)
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!(
        "Unknown configuration key: {}. Use `knowgraph config list` to see available keys.",
        key
    )
}
