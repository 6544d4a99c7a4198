use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SCOUT_DIR: &str = ".scout";

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use tools only when needed.";
pub const DEFAULT_GREETING: &str = "Hi! Ask me anything.";

/// Env vars checked for the API key, in order, before the config file.
pub const API_KEY_ENV_VARS: &[&str] = &["GROQ_API_KEY", "SCOUT_API_KEY"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Character budget for a single tool result.
    pub max_chars: usize,
    pub top_k_results: usize,
    pub enabled: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_chars: 200,
            top_k_results: 1,
            enabled: vec![
                "web_search".to_string(),
                "arxiv".to_string(),
                "wikipedia".to_string(),
            ],
        }
    }
}

impl ToolsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub greeting: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    pub stream: StreamConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            max_iterations: None,
            stream: StreamConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        let path = get_config_path();
        if path.exists() {
            load_config_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// API key from the environment, falling back to the config file.
    /// Empty values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|var| std::env::var(var).ok())
    }

    fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|&var| env(var))
            .chain(std::iter::once(self.api_key.clone()))
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }
}

pub fn get_scout_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(SCOUT_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_scout_dir().join("config.toml")
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))
}

pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = get_config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}
