//! Configuration system (layered: defaults < TOML file < environment).
//!
//! Per-run overrides come from request metadata and are resolved by the
//! session runner on top of the values loaded here.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConductorError;
use crate::types::ModelPricing;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CONDUCTOR_CONFIG";

const ENV_MAX_ITERATIONS: &str = "CONDUCTOR_MAX_ITERATIONS";
const ENV_NO_TOOL_CALL_LIMIT: &str = "CONDUCTOR_NO_TOOL_CALL_LIMIT";
const ENV_RETRY_MAX_ATTEMPTS: &str = "CONDUCTOR_RETRY_MAX_ATTEMPTS";
const ENV_RETRY_BASE_DELAY_MS: &str = "CONDUCTOR_RETRY_BASE_DELAY_MS";
const ENV_RETRY_MAX_DELAY_MS: &str = "CONDUCTOR_RETRY_MAX_DELAY_MS";
const ENV_RETRY_MAX_TOTAL_WAIT_MS: &str = "CONDUCTOR_RETRY_MAX_TOTAL_WAIT_MS";
const ENV_PARALLEL_TOOLS: &str = "CONDUCTOR_PARALLEL_TOOLS";
const ENV_ALLOW_MULTIPLE_TOOL_CALLS: &str = "CONDUCTOR_ALLOW_MULTIPLE_TOOL_CALLS";
const ENV_TOOL_BATCH_TIMEOUT_MS: &str = "CONDUCTOR_TOOL_BATCH_TIMEOUT_MS";
const ENV_TOTAL_BUDGET_USD: &str = "CONDUCTOR_TOTAL_BUDGET_USD";
const ENV_USER_BUDGET_USD: &str = "CONDUCTOR_USER_BUDGET_USD";
const ENV_IDLE_TIMEOUT_SECS: &str = "CONDUCTOR_IDLE_TIMEOUT_SECS";
const ENV_MODEL: &str = "CONDUCTOR_MODEL";
const ENV_BASE_URL: &str = "CONDUCTOR_BASE_URL";
const ENV_API_KEY: &str = "CONDUCTOR_API_KEY";

/// Every environment variable the config layer reads.
pub const CONFIG_ENV_VARS: [&str; 16] = [
    CONFIG_PATH_ENV,
    ENV_MAX_ITERATIONS,
    ENV_NO_TOOL_CALL_LIMIT,
    ENV_RETRY_MAX_ATTEMPTS,
    ENV_RETRY_BASE_DELAY_MS,
    ENV_RETRY_MAX_DELAY_MS,
    ENV_RETRY_MAX_TOTAL_WAIT_MS,
    ENV_PARALLEL_TOOLS,
    ENV_ALLOW_MULTIPLE_TOOL_CALLS,
    ENV_TOOL_BATCH_TIMEOUT_MS,
    ENV_TOTAL_BUDGET_USD,
    ENV_USER_BUDGET_USD,
    ENV_IDLE_TIMEOUT_SECS,
    ENV_MODEL,
    ENV_BASE_URL,
    ENV_API_KEY,
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    pub limits: LimitsConfig,
    pub retry: RetryConfig,
    pub tools: ToolsConfig,
    pub budget: BudgetConfig,
    pub session: SessionConfig,
    pub provider: ProviderConfig,
}

/// Loop limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_iterations: usize,
    /// Consecutive replies without tool calls before the session gives up.
    pub no_tool_call_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            no_tool_call_limit: 3,
        }
    }
}

/// Iteration retry/backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Ceiling on backoff accumulated over the whole session.
    pub max_total_wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_total_wait_ms: 300_000,
        }
    }
}

/// Tool execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Run each batch concurrently instead of one call at a time.
    pub parallel: bool,
    /// Honor every call in a batch rather than only the first.
    pub allow_multiple_calls: bool,
    /// Whole-batch timeout for parallel execution.
    pub batch_timeout_ms: Option<u64>,
}

impl ToolsConfig {
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

/// Spend ceilings and pricing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Process-wide ceiling in USD.
    pub total_usd: Option<f64>,
    /// Per-user ceiling in USD.
    pub per_user_usd: Option<f64>,
    pub pricing: ModelPricing,
}

/// Session defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub stop_sequences: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            stop_sequences: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Model provider connection.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            request_timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ConductorConfig {
    /// Load defaults, then the config file (if any), then the environment.
    ///
    /// `.env` is loaded first when present. The file is `$CONDUCTOR_CONFIG` or
    /// [`default_config_path`]; a missing file is not an error.
    pub fn load() -> Result<Self, ConductorError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConductorError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            ConductorError::Configuration(message) => {
                ConductorError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse TOML text; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConductorError> {
        toml::from_str(raw).map_err(|err| ConductorError::Configuration(err.to_string()))
    }

    /// Overlay `CONDUCTOR_*` environment variables.
    ///
    /// Unparseable values are logged and skipped.
    pub fn apply_env(&mut self) {
        env_override(ENV_MAX_ITERATIONS, &mut self.limits.max_iterations);
        env_override(ENV_NO_TOOL_CALL_LIMIT, &mut self.limits.no_tool_call_limit);
        env_override(ENV_RETRY_MAX_ATTEMPTS, &mut self.retry.max_attempts);
        env_override(ENV_RETRY_BASE_DELAY_MS, &mut self.retry.base_delay_ms);
        env_override(ENV_RETRY_MAX_DELAY_MS, &mut self.retry.max_delay_ms);
        env_override(ENV_RETRY_MAX_TOTAL_WAIT_MS, &mut self.retry.max_total_wait_ms);
        env_override(ENV_PARALLEL_TOOLS, &mut self.tools.parallel);
        env_override(ENV_ALLOW_MULTIPLE_TOOL_CALLS, &mut self.tools.allow_multiple_calls);
        env_override_opt(ENV_TOOL_BATCH_TIMEOUT_MS, &mut self.tools.batch_timeout_ms);
        env_override_opt(ENV_TOTAL_BUDGET_USD, &mut self.budget.total_usd);
        env_override_opt(ENV_USER_BUDGET_USD, &mut self.budget.per_user_usd);
        env_override(ENV_IDLE_TIMEOUT_SECS, &mut self.session.idle_timeout_secs);
        env_override(ENV_MODEL, &mut self.provider.model);
        env_override(ENV_BASE_URL, &mut self.provider.base_url);
        env_override_opt(ENV_API_KEY, &mut self.provider.api_key);
    }
}

/// `<config dir>/conductor/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("conductor").join("config.toml"))
}

fn read_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = trimmed, "ignoring unparseable config override");
            None
        }
    }
}

fn env_override<T: FromStr>(key: &str, slot: &mut T) {
    if let Some(value) = read_env(key) {
        *slot = value;
    }
}

fn env_override_opt<T: FromStr>(key: &str, slot: &mut Option<T>) {
    if let Some(value) = read_env(key) {
        *slot = Some(value);
    }
}
