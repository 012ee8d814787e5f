use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub mall: MallConfig,
}

/// Which reasoning source backs the planner's decomposition step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningMode {
    /// Deterministic keyword and capability-tag planning, no network
    #[default]
    Rules,
    /// Ask the configured LLM for the plan
    Llm,
}

/// Configuration for the decision-making layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub reasoning: ReasoningMode,

    /// Below this perception confidence the planner asks a clarifying question (default: 0.5)
    #[serde(default = "default_min_confidence")]
    pub min_confidence_threshold: f64,

    /// How many prior turns are visible to constraint inference (default: 5)
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Upper bound on a single reasoning-source call in seconds (default: 30)
    #[serde(default = "default_reasoning_timeout")]
    pub reasoning_source_timeout_secs: u64,

    /// Delay before retrying an unavailable reasoning source (default: 500ms)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

const HISTORY_RETENTION_WINDOWS: usize = 4;

fn default_min_confidence() -> f64 {
    0.5
}

fn default_history_window() -> usize {
    5
}

fn default_reasoning_timeout() -> u64 {
    30
}

fn default_retry_backoff() -> u64 {
    500
}

impl PlannerConfig {
    pub fn reasoning_source_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_source_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Turns a session keeps; a few windows' worth so memory stays bounded
    pub fn history_capacity(&self) -> usize {
        self.history_window.saturating_mul(HISTORY_RETENTION_WINDOWS)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningMode::default(),
            min_confidence_threshold: default_min_confidence(),
            history_window: default_history_window(),
            reasoning_source_timeout_secs: default_reasoning_timeout(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MallConfig {
    /// JSON mall directory to load instead of the built-in one
    #[serde(default)]
    pub data_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    /// Base URL for API (optional, for Ollama or custom endpoints)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Requests allowed per rolling minute, 0 disables the limit (default: 10)
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
}

fn default_max_requests_per_minute() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    Ollama,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("mall-assistant").join("config.toml"))
    }

    /// Reject values the planner cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.planner.min_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "planner.min_confidence_threshold must be within [0, 1], got {}",
                threshold
            );
        }
        if self.planner.history_window == 0 {
            anyhow::bail!("planner.history_window must be at least 1");
        }
        if self.planner.reasoning_source_timeout_secs == 0 {
            anyhow::bail!("planner.reasoning_source_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Effective API key: configured value first, then the environment
    pub fn get_auth_token(&self) -> Result<String> {
        if let Some(key) = &self.llm.api_key {
            return Ok(key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY").context("No API key configured and ANTHROPIC_API_KEY is not set")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                model: "claude-sonnet-4-20250514".to_string(),
                max_tokens: 2000,
                base_url: None,
                max_requests_per_minute: default_max_requests_per_minute(),
            },
            planner: PlannerConfig::default(),
            mall: MallConfig::default(),
        }
    }
}
