use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::refresh::RefreshMode;

// Default configuration values
const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_CONFIG_PATH: &str = "herdline.config.json";
const DEFAULT_TOKEN_STORE_PATH: &str = "herdline.tokens.json";

/// Main configuration struct for herdline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Authentication endpoints and session behaviour
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Origin of the REST API, without a trailing path
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds; 0 disables it
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_register_path")]
    pub register_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_me_path")]
    pub me_path: String,
    /// Where the file token store keeps credentials
    #[serde(default = "default_token_store_path")]
    pub token_store_path: PathBuf,
    /// How concurrent 401s share refresh calls
    #[serde(default)]
    pub refresh_mode: RefreshMode,
    /// Send users to login even when an anonymous GET loses its session
    #[serde(default)]
    pub redirect_on_public_read: bool,
}

// Default functions
fn default_base_url() -> String {
    std::env::var("HERDLINE_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn default_timeout() -> u64 {
    std::env::var("HERDLINE_TIMEOUT_SECONDS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
}

fn default_user_agent() -> String {
    format!("herdline/{}", crate::VERSION)
}

fn default_login_path() -> String {
    "/api/auth/login/".to_string()
}

fn default_register_path() -> String {
    "/api/auth/register/".to_string()
}

fn default_refresh_path() -> String {
    crate::http::DEFAULT_REFRESH_PATH.to_string()
}

fn default_me_path() -> String {
    "/api/auth/me/".to_string()
}

fn default_token_store_path() -> PathBuf {
    std::env::var("HERDLINE_TOKEN_STORE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_STORE_PATH))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            register_path: default_register_path(),
            refresh_path: default_refresh_path(),
            me_path: default_me_path(),
            token_store_path: default_token_store_path(),
            refresh_mode: RefreshMode::default(),
            redirect_on_public_read: false,
        }
    }
}

/// Manages configuration for the application
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a configuration manager from the default location
    pub async fn new() -> Result<Self> {
        Self::open(get_config_path()).await
    }

    /// Create a configuration manager backed by `config_path`
    pub async fn open(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let config = load_or_create_config(&config_path).await?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a clone of the current configuration
    pub async fn get_config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Update the configuration
    pub async fn update_config(&self, new_config: Config) -> Result<()> {
        *self.config.write().await = new_config.clone();
        save_config(&self.config_path, &new_config).await?;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Load the application configuration
pub async fn load_config() -> Result<Config> {
    let config_manager = ConfigManager::new().await?;
    Ok(config_manager.get_config().await)
}

/// Get the path to the configuration file
fn get_config_path() -> PathBuf {
    std::env::var("HERDLINE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from file or create default
async fn load_or_create_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let default_config = Config::default();
        save_config(path, &default_config).await?;
        info!("Created default configuration at {}", path.display());
        return Ok(default_config);
    }

    let config_str = fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&config_str)?;
    debug!("Loaded configuration from {}", path.display());

    Ok(config)
}

/// Save configuration to file
async fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(path, config_str).await?;
    debug!("Saved configuration to {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> PathBuf {
        std::env::temp_dir()
            .join(format!("herdline-config-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"auth":{"refresh_mode":"independent"}}"#).unwrap();
        assert_eq!(config.auth.refresh_mode, RefreshMode::Independent);
        assert_eq!(config.auth.refresh_path, "/api/auth/refresh/");
        assert_eq!(config.auth.login_path, "/api/auth/login/");
        assert!(!config.auth.redirect_on_public_read);
        assert!(config.api.user_agent.starts_with("herdline/"));
    }

    #[tokio::test]
    async fn test_manager_creates_and_updates_file() {
        let path = temp_config();

        let manager = ConfigManager::open(&path).await.unwrap();
        assert!(path.exists());

        let mut config = manager.get_config().await;
        config.api.base_url = "https://api.example.test".to_string();
        config.auth.redirect_on_public_read = true;
        manager.update_config(config).await.unwrap();

        let reopened = ConfigManager::open(&path).await.unwrap().get_config().await;
        assert_eq!(reopened.api.base_url, "https://api.example.test");
        assert!(reopened.auth.redirect_on_public_read);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
