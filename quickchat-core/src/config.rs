// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates backend URLs and presence settings, provides defaults for everything else
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// AI-control backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Auth backend; shares the AI backend's URL unless set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Member ids starting with this prefix are AI agents
    #[serde(default = "default_agent_prefix")]
    pub agent_prefix: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            agent_prefix: default_agent_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Upper bound on AI-to-AI turns; the backend default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the credential database (defaults to the XDG data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_agent_prefix() -> String {
    "ai-bot".to_string()
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    } else if path == "~" {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().to_string_lossy().to_string();
        }
        tracing::warn!("Failed to expand tilde: could not determine home directory");
    }
    path.to_string()
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("{} must start with http:// or https://, got: {}", field, url);
    }
    Ok(())
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. QUICKCHAT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/quickchat/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("QUICKCHAT_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %env_path, "QUICKCHAT_CONFIG_PATH does not exist, ignoring");
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.storage.path = config.storage.path.as_deref().map(expand_tilde);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("QUICKCHAT_SERVER_URL") {
            self.backend.url = val;
        }
        if let Ok(val) = std::env::var("QUICKCHAT_TIMEOUT_SECS") {
            self.backend.timeout_secs = val.parse().with_context(|| {
                format!("QUICKCHAT_TIMEOUT_SECS must be a valid number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("QUICKCHAT_AUTH_URL") {
            self.auth.url = Some(val);
        }
        if let Ok(val) = std::env::var("QUICKCHAT_AGENT_PREFIX") {
            self.presence.agent_prefix = val;
        }
        if let Ok(val) = std::env::var("QUICKCHAT_MAX_TURNS") {
            self.conversation.max_turns = Some(val.parse().with_context(|| {
                format!("QUICKCHAT_MAX_TURNS must be a valid number, got: {}", val)
            })?);
        }
        if let Ok(val) = std::env::var("QUICKCHAT_DATA_DIR") {
            self.storage.path = Some(val);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_url("backend.url", &self.backend.url)?;
        if let Some(url) = &self.auth.url {
            validate_url("auth.url", url)?;
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be greater than 0");
        }
        if self.presence.agent_prefix.trim().is_empty() {
            anyhow::bail!("presence.agent_prefix must not be empty");
        }
        if self.conversation.max_turns == Some(0) {
            anyhow::bail!("conversation.max_turns must be greater than 0");
        }
        Ok(())
    }

    pub fn auth_url(&self) -> &str {
        self.auth.url.as_deref().unwrap_or(&self.backend.url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(paths::DATABASE_FILE)
    }
}
