//! Configuration management for the Miku bot.
//!
//! Configuration lives in a single JSON file at `~/.miku/config.json`.
//! A missing file is not an error: defaults are used and the two secrets
//! (Telegram token, completion API key) are expected from the environment.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `MIKU_CONFIG` → alternative config file path
//! - `BOT_TOKEN` / `TELEGRAM_BOT_TOKEN` → telegram.bot_token
//! - `DEEPSEEK_API_KEY` → llm.api_key
//! - `MIKU_LLM_BASE_URL` → llm.base_url
//! - `MIKU_LLM_MODEL` → llm.model
//! - `MIKU_LOG_LEVEL` → observability.log_level
//! - `MIKU_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".miku"),
        |dirs| dirs.home_dir().join(".miku"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var("MIKU_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the bot process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Telegram transport
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Completion service
    #[serde(default)]
    pub llm: LlmConfig,

    /// Conversation history
    #[serde(default)]
    pub session: SessionConfig,

    /// Persona overrides (unset fields fall back to the built-in persona)
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file.
    File(PathBuf),
    /// No file at this path; built-in defaults were used.
    Defaults(PathBuf),
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<(Self, ConfigSource)> {
        Self::load_or_default(&config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<(Self, ConfigSource)> {
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())));
        }

        let config = Self::load_from(path)?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<(Self, ConfigSource)> {
        let (mut config, source) = Self::load()?;
        config.apply_env_overrides();
        Ok((config, source))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank variables count as unset
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("BOT_TOKEN").or_else(|| lookup("TELEGRAM_BOT_TOKEN")) {
            self.telegram.bot_token = Some(token);
        }

        if let Some(key) = lookup("DEEPSEEK_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("MIKU_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("MIKU_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(level) = lookup("MIKU_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("MIKU_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Telegram bot token, if one is configured and non-empty.
    pub fn telegram_bot_token(&self) -> Option<&str> {
        self.telegram.bot_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Completion API key, if one is configured and non-empty.
    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Telegram channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Long-poll timeout passed to `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Completion service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API (without `/v1/...`)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API key (usually supplied through `DEEPSEEK_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum tokens to generate per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout for a single completion call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Conversation history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum turns kept (system turn included) before a completion call
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Hold the user's session lock across the completion call.
    ///
    /// When false, concurrent messages from the same user interleave
    /// their turns while a call is in flight.
    #[serde(default = "default_true")]
    pub serialize_per_user: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            serialize_per_user: true,
        }
    }
}

/// Persona overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Names the bot answers to
    #[serde(default)]
    pub aliases: Option<Vec<String>>,

    /// Replies to a bare name mention
    #[serde(default)]
    pub greetings: Option<Vec<String>>,

    /// System instruction seeded into every session
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Reply sent when the completion service fails
    #[serde(default)]
    pub apology: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_llm_base_url() -> String {
    "https://api.deepseek.com".into()
}

fn default_llm_model() -> String {
    "deepseek-chat".into()
}

fn default_max_tokens() -> i64 {
    1000
}

fn default_temperature() -> f64 {
    0.8
}

fn default_timeout() -> u64 {
    120
}

fn default_max_turns() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
