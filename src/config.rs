use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no key is stored in the config file
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Largest file accepted as an attachment (5 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the generative-language API
    pub api_key: Option<String>,

    /// Model name used in the endpoint path
    pub model: String,

    /// API root, without the `/models/...` suffix
    pub base_url: String,

    /// HTTP timeout for a single request
    pub request_timeout_secs: u64,

    /// Pause between sending and issuing the call, so the loading bubble shows
    pub reply_delay_ms: u64,

    /// Cadence of the typing effect
    pub reveal_interval_ms: u64,

    pub max_attachment_bytes: u64,

    /// Prompts offered before the first message
    pub suggestions: Vec<String>,

    /// gemchat home directory
    #[serde(skip)]
    pub home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 60,
            reply_delay_ms: 600,
            reveal_interval_ms: 40,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            suggestions: default_suggestions(),
            home: home.join(".gemchat"),
        }
    }
}

fn default_suggestions() -> Vec<String> {
    vec![
        "Design a home office setup for remote work under $500.".to_string(),
        "How can I level up my web development expertise in 2025?".to_string(),
        "Suggest some useful tools for debugging JavaScript code.".to_string(),
        "Create a Rust function that checks whether a string is a palindrome.".to_string(),
    ]
}

impl Config {
    /// Load configuration from `~/.gemchat/config.toml`
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".gemchat"))
    }

    /// Load configuration from a specific gemchat home directory
    pub fn load_from(gemchat_home: &Path) -> Result<Self> {
        let config_path = gemchat_home.join("config.toml");

        fs::create_dir_all(gemchat_home).context("Failed to create .gemchat directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home = gemchat_home.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home).context("Failed to create .gemchat directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(self.config_path(), content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.home.join("preferences.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Full `generateContent` URL for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// Get API key from config or environment
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.max_attachment_bytes, 5 * 1024 * 1024);
        assert_eq!(config.reveal_interval(), Duration::from_millis(40));
        assert_eq!(config.reply_delay(), Duration::from_millis(600));
        assert_eq!(config.suggestions.len(), 4);
    }

    #[test]
    fn test_endpoint() {
        let config = Config {
            base_url: "http://localhost:8080/v1beta/".to_string(),
            model: "gemini-test".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.home, dir.path());
        assert_eq!(config.reveal_interval_ms, 40);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "model = \"gemini-1.5-pro\"\nreveal_interval_ms = 10\n",
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.reveal_interval_ms, 10);
        assert_eq!(config.reply_delay_ms, 600);
    }

    #[test]
    fn test_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load_from(dir.path()).unwrap();
        config.api_key = Some("secret".to_string());
        config.suggestions = vec!["Tell me a joke".to_string()];
        config.save().unwrap();

        let reloaded = Config::load_from(dir.path()).unwrap();
        assert_eq!(reloaded.api_key.as_deref(), Some("secret"));
        assert_eq!(reloaded.suggestions, vec!["Tell me a joke".to_string()]);
        assert!(reloaded.has_api_key());
    }
}
