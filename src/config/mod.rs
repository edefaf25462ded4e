use crate::auth::{ChannelAuth, EnvToken};
use crate::channel::ChannelConfig;
use crate::endpoint::{
    EndpointBuilder, EndpointError, Environment, PageOrigin, DEFAULT_DEV_PORT, DEFAULT_PATH_PREFIX,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub const PAGE_URL_ENV: &str = "LABWATCH_PAGE_URL";
pub const ENVIRONMENT_ENV: &str = "LABWATCH_ENVIRONMENT";
pub const DEFAULT_TOKEN_ENV: &str = "LABWATCH_TOKEN";

/// Complete labwatch configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabwatchConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Where the realtime endpoint lives relative to the dashboard page
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Origin of the hosting page, e.g. `https://monitor.example.org`
    #[serde(default = "default_page_url")]
    pub page_url: String,
    #[serde(default = "default_environment")]
    pub environment: Environment,
    /// Backend port used in development, regardless of the page port
    #[serde(default = "default_dev_port")]
    pub dev_port: u16,
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

fn default_page_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_dev_port() -> u16 {
    DEFAULT_DEV_PORT
}

fn default_path_prefix() -> String {
    DEFAULT_PATH_PREFIX.to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            environment: default_environment(),
            dev_port: default_dev_port(),
            path_prefix: default_path_prefix(),
        }
    }
}

/// Channel authentication
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: ChannelAuth,
    /// Environment variable holding the session token, read on every attempt
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: ChannelAuth::default(),
            token_env: default_token_env(),
        }
    }
}

impl LabwatchConfig {
    /// Apply `LABWATCH_PAGE_URL` / `LABWATCH_ENVIRONMENT` from the process
    /// environment. The token itself is never stored here; it is looked up
    /// through `auth.token_env` at connect time.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(PAGE_URL_ENV) {
            self.endpoint.page_url = url;
        }
        if let Some(env) = lookup(ENVIRONMENT_ENV) {
            self.endpoint.environment = env
                .parse()
                .with_context(|| format!("Invalid {}", ENVIRONMENT_ENV))?;
        }
        Ok(())
    }

    /// Endpoint builder for this configuration
    pub fn endpoint_builder(&self) -> Result<EndpointBuilder, EndpointError> {
        let origin = PageOrigin::parse(&self.endpoint.page_url)?;

        Ok(EndpointBuilder::new(origin, self.endpoint.environment)
            .dev_port(self.endpoint.dev_port)
            .path_prefix(self.endpoint.path_prefix.clone())
            .auth(
                self.auth.mode,
                Arc::new(EnvToken::new(self.auth.token_env.clone())),
            ))
    }
}

/// Load configuration from a TOML file; no path means defaults
pub fn load_config(path: Option<&Path>) -> Result<LabwatchConfig> {
    let Some(path) = path else {
        return Ok(LabwatchConfig::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: LabwatchConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::TargetId;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LabwatchConfig::default();
        assert_eq!(config.channel.max_reconnect_attempts, 5);
        assert_eq!(config.channel.reconnect_delay_ms, 3000);
        assert_eq!(config.channel.heartbeat_period_ms, 30_000);
        assert_eq!(config.endpoint.environment, Environment::Development);
        assert_eq!(config.endpoint.dev_port, 8083);
        assert_eq!(config.auth.mode, ChannelAuth::None);
        assert_eq!(config.auth.token_env, "LABWATCH_TOKEN");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [channel]
            max_reconnect_attempts = 3
            reconnect_delay_ms = 1000
            heartbeat_period_ms = 15000

            [endpoint]
            page_url = "https://monitor.example.org"
            environment = "production"
            path_prefix = "/realtime/"

            [auth]
            mode = "query"
            token_env = "MONITOR_TOKEN"
        "#;

        let config: LabwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.channel.max_reconnect_attempts, 3);
        assert_eq!(config.channel.reconnect_delay_ms, 1000);
        assert_eq!(config.endpoint.environment, Environment::Production);
        assert_eq!(config.endpoint.dev_port, 8083); // Default
        assert_eq!(config.auth.mode, ChannelAuth::Query);
        assert_eq!(config.auth.token_env, "MONITOR_TOKEN");
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [channel]
            reconnect_delay_ms = 500
        "#;

        let config: LabwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.channel.reconnect_delay_ms, 500);
        assert_eq!(config.channel.max_reconnect_attempts, 5); // Default
        assert_eq!(config.endpoint.path_prefix, "/ws/realtime"); // Default
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let toml = r#"
            [endpoint]
            environment = "staging"
        "#;

        assert!(toml::from_str::<LabwatchConfig>(toml).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[endpoint]\ndev_port = 9090").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.endpoint.dev_port, 9090);
    }

    #[test]
    fn test_load_config_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.channel.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (PAGE_URL_ENV, "https://monitor.example.org:8443"),
            (ENVIRONMENT_ENV, "prod"),
        ]
        .into_iter()
        .collect();

        let mut config = LabwatchConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.endpoint.page_url, "https://monitor.example.org:8443");
        assert_eq!(config.endpoint.environment, Environment::Production);

        let endpoint = config
            .endpoint_builder()
            .unwrap()
            .build(TargetId::new(3).unwrap())
            .unwrap();
        assert_eq!(endpoint.url, "wss://monitor.example.org:8443/ws/realtime/3");
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = LabwatchConfig::default();
        let result = config.apply_overrides(|key| {
            (key == ENVIRONMENT_ENV).then(|| "staging".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_builder_rejects_bad_origin() {
        let mut config = LabwatchConfig::default();
        config.endpoint.page_url = "ftp://files.example.org".to_string();
        assert!(matches!(
            config.endpoint_builder(),
            Err(EndpointError::UnsupportedScheme(_))
        ));
    }
}
