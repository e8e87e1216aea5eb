use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Environment variable that overrides `auth_token` from the config file.
pub const AUTH_TOKEN_ENV: &str = "FXRATE_AUTH_TOKEN";

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_cache_duration_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendProviderConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExternalProviderConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub backend: Option<BackendProviderConfig>,
    pub external: Option<ExternalProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            backend: None,
            external: Some(ExternalProviderConfig {
                base_url: "https://rates.fxrate.dev/v1".to_string(),
                timeout_secs: default_timeout_secs(),
                retries: default_retries(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub auth_token: Option<String>,
    #[serde(default = "default_cache_duration_hours")]
    pub cache_duration_hours: i64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_currency: default_base_currency(),
            watchlist: Vec::new(),
            providers: ProvidersConfig::default(),
            auth_token: None,
            cache_duration_hours: default_cache_duration_hours(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "fxrate", "fxrate")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Token for the backend; the environment wins over the config file.
    pub fn auth_token(&self) -> Option<String> {
        Self::resolve_token(std::env::var(AUTH_TOKEN_ENV).ok(), self.auth_token.as_deref())
    }

    fn resolve_token(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
        from_env
            .or_else(|| from_file.map(str::to_string))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    pub fn cache_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_duration_hours.max(0))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
