//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for natter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to chat with
    pub model: String,
    /// Name stamped on your turns
    pub user: String,
    /// Narrate answers by default
    pub speak: bool,
    /// Program that speaks its last argument
    pub speech_command: String,
    /// Override the model's context window (tokens)
    pub context_window: Option<u32>,
    /// OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// API key (alternative to OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// Directory searched by :vault:NAME: links
    pub vault_dir: Option<String>,
    /// Delay between retries of a failed request
    pub retry_delay_ms: u64,
    /// Printed after the speaker name in prompts and transcripts
    pub prompt_postfix: String,
    /// Persona used when none is given on the command line
    pub persona: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            user: std::env::var("USER").unwrap_or_else(|_| "user".to_string()),
            speak: false,
            speech_command: "espeak".to_string(),
            context_window: None,
            base_url: None,
            api_key: None,
            vault_dir: None,
            retry_delay_ms: 1000,
            prompt_postfix: " ".to_string(),
            persona: crate::persona::DEFAULT_PERSONA.to_string(),
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("natter")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NATTER_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Directory holding chats and input history
    pub fn data_dir() -> PathBuf {
        if let Ok(path) = std::env::var("NATTER_DATA_DIR") {
            return PathBuf::from(path);
        }
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("natter")
    }

    /// Load config from file
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, warning and falling back to defaults when it
    /// cannot be read.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Write the example config if no config file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// API key from the config, else the environment
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Vault directory with `~/` expanded
    pub fn vault_dir(&self) -> Option<PathBuf> {
        self.vault_dir.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# natter configuration file
# Place at ~/.config/natter/config.toml (Linux) or set NATTER_CONFIG_PATH

# Model to chat with
model = "gpt-4"

# Name stamped on your turns
# user = "ana"

# Narrate answers by default, and the program used to speak
speak = false
speech_command = "espeak"

# Override the context window of the model (tokens)
# context_window = 8192

# OpenAI-compatible endpoint and key (OPENAI_API_KEY is used when unset)
# base_url = "https://api.openai.com/v1"
# api_key = "sk-..."

# Directory searched by :vault:NAME: links
# vault_dir = "~/notes"

# Delay between retries of a failed request
retry_delay_ms = 1000

# Printed after the speaker name
prompt_postfix = " "

# Persona used when -p is not given
persona = "helpful_assistant"
"#
}
