//! StoryDaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main StoryDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Generation pipeline tuning
    pub generation: GenerationConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level override ("trace".."error"); the CLI flag wins
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables and values are set
    /// correctly. Call this early in startup to fail fast with clear
    /// error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.llm.models.is_empty() {
            return Err(eyre::eyre!("Model catalog is empty. Configure at least one model under llm.models."));
        }
        if self.generation.max_attempts == 0 {
            return Err(eyre::eyre!("generation.max-attempts must be at least 1"));
        }
        Ok(())
    }

    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env)
            .context(format!("{} environment variable not set", self.llm.api_key_env))
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .storydaemon.yml
        let local_config = PathBuf::from(".storydaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/storydaemon/storydaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("storydaemon").join("storydaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Model catalog, highest priority first. Fallback walks this list
    /// in order.
    pub models: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            models: vec![
                "mistralai/mistral-7b-instruct:free".to_string(),
                "google/gemma-7b-it:free".to_string(),
                "huggingfaceh4/zephyr-7b-beta:free".to_string(),
            ],
        }
    }
}

/// Generation pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per model for non-streaming generation
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts against the same model
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Timeout for the story body call
    #[serde(rename = "body-timeout-ms")]
    pub body_timeout_ms: u64,

    /// Timeout for the shorter refinement and metadata calls
    #[serde(rename = "aux-timeout-ms")]
    pub aux_timeout_ms: u64,

    /// Comprehension questions requested per story
    #[serde(rename = "question-count")]
    pub question_count: u32,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,
}

impl GenerationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn body_timeout(&self) -> Duration {
        Duration::from_millis(self.body_timeout_ms)
    }

    pub fn aux_timeout(&self) -> Duration {
        Duration::from_millis(self.aux_timeout_ms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2_000,
            body_timeout_ms: 90_000,
            aux_timeout_ms: 60_000,
            question_count: 3,
            max_tokens: 4096,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the story database
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,
}

impl StorageConfig {
    /// Path to the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.store_dir.join("stories.db")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/storydaemon on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("storydaemon"))
            .unwrap_or_else(|| PathBuf::from(".storydaemon"));

        Self { store_dir }
    }
}
