use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ClientConfig {
    /// Load from `AGORA_CLIENT_CONFIG` (default `config/client.toml`), with an
    /// optional `config/client.<env>.toml` overlay selected by
    /// `AGORA_CLIENT_ENV`.
    pub fn load() -> Result<Self> {
        let configured_path = std::env::var("AGORA_CLIENT_CONFIG")
            .unwrap_or_else(|_| "config/client.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("AGORA_CLIENT_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/client.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize client configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        assert!(
            !self.backend.base_url.is_empty(),
            "Backend base URL must be specified"
        );
        assert!(
            self.backend.base_url.starts_with("http://")
                || self.backend.base_url.starts_with("https://"),
            "Backend base URL must be an HTTP(S) endpoint"
        );
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_ms: Option<u64>,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "Request timeout must be at least 100ms");
        assert!(millis <= 60_000, "Request timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub groups_max_capacity: u64,
    pub groups_ttl_seconds: u64,
    pub memberships_max_capacity: u64,
    pub memberships_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            groups_max_capacity: 100,
            groups_ttl_seconds: 300,
            memberships_max_capacity: 100,
            memberships_ttl_seconds: 60,
        }
    }
}

impl CacheConfig {
    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.groups_max_capacity >= 1,
            "Group cache capacity must be positive"
        );
        assert!(
            self.groups_ttl_seconds <= 86_400,
            "Group cache TTL cannot exceed one day"
        );
        assert!(
            self.memberships_max_capacity >= 1,
            "Membership cache capacity must be positive"
        );
        assert!(
            self.memberships_ttl_seconds <= 3_600,
            "Membership cache TTL cannot exceed one hour"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
