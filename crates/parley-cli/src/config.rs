//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat model id (default: gpt-4o)
    pub model: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: Option<String>,
    /// Custom system prompt file path
    pub system_prompt_file: Option<String>,
    /// Phrase that routes a message straight to the bot
    pub trigger_phrase: Option<String>,
    /// Number of recent messages handed to the model
    pub recent_messages: Option<usize>,
    /// Endpoint of the task bot
    pub bot_url: Option<String>,
    /// Timeout for bot requests, in seconds
    pub bot_timeout_secs: Option<u64>,
    /// Directory holding stored sessions
    pub sessions_dir: Option<String>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(parley_ai::Model::default().id),
            trigger_phrase: Some(parley_agent::orchestrator::DEFAULT_TRIGGER_PHRASE.to_string()),
            recent_messages: Some(parley_agent::window::DEFAULT_RECENT_MESSAGES),
            bot_timeout_secs: Some(DEFAULT_BOT_TIMEOUT_SECS),
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// OpenAI API key, checking config then env
    pub fn openai_api_key(&self) -> Option<String> {
        self.api_keys
            .openai
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(parley_ai::providers::OpenAIProvider::API_KEY_ENV).ok())
    }

    /// Bot request timeout
    pub fn bot_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.bot_timeout_secs.unwrap_or(DEFAULT_BOT_TIMEOUT_SECS))
    }

    /// Read the custom system prompt, if one is configured
    pub fn system_prompt(&self) -> std::io::Result<Option<String>> {
        match &self.system_prompt_file {
            Some(file) => fs::read_to_string(expand_home(file)).map(Some),
            None => Ok(None),
        }
    }
}

/// Default timeout for bot requests
pub const DEFAULT_BOT_TIMEOUT_SECS: u64 = 30;

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux) or set PARLEY_CONFIG_PATH

# Chat model to use
model = "gpt-4o"

# OpenAI-compatible API base URL (optional)
# base_url = "https://api.openai.com/v1"

# Custom system prompt file (optional)
# system_prompt_file = "~/.config/parley/system_prompt.txt"

# Messages containing this phrase go straight to the bot
trigger_phrase = "hello code"

# How many recent messages the model sees, besides the system prompt
recent_messages = 10

# Task bot endpoint; arguments are POSTed as JSON (optional)
# bot_url = "http://localhost:8080/bot"
bot_timeout_secs = 30

# Where sessions are stored (optional)
# sessions_dir = "~/.local/share/parley/sessions"

# API keys (optional - can also use OPENAI_API_KEY)
[api_keys]
# openai = "sk-..."
"#
}
