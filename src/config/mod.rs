pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_PATH_ENV: &str = "LONGCAT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No API key found. Please set LONGCAT_API_KEY")]
    MissingApiKey,
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Overall upstream timeout in seconds, covering connect and the full stream.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default)]
    pub base_path: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    120
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            base_path: String::new(),
        }
    }
}

/// The single upstream provider this bridge talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

fn default_base_url() -> String {
    "https://api.longcat.chat/openai".to_string()
}
fn default_model() -> String {
    "longcat-flash-thinking".to_string()
}
fn default_max_tokens() -> u64 {
    8192
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Prefix the answer with the upstream reasoning text as a `<details>` block.
    #[serde(default)]
    pub show_reasoning: bool,
    /// Pause between the synthetic chunk and `[DONE]`; 0 disables it.
    #[serde(default = "default_done_delay_ms")]
    pub done_delay_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_done_delay_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            show_reasoning: false,
            done_delay_ms: default_done_delay_ms(),
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl AppConfig {
    /// Overlay recognised environment variables onto this config.
    ///
    /// `lookup` abstracts `std::env::var` so the overlay is testable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a numeric or boolean variable
    /// does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LONGBASE") {
            self.upstream.base_url = value;
        }
        if let Some(value) = lookup("LONGCAT_API_KEY") {
            self.upstream.api_key = value;
        }
        if let Some(value) = lookup("LONGCAT_HOST") {
            self.server.host = value;
        }
        if let Some(value) = lookup("LONGCAT_PORT") {
            self.server.port = parse_env("LONGCAT_PORT", &value)?;
        }
        if let Some(value) = lookup("LONGCAT_TIMEOUT") {
            self.server.timeout = parse_env("LONGCAT_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("LONGCAT_SHOW_THINKING") {
            self.features.show_reasoning = parse_env_bool("LONGCAT_SHOW_THINKING", &value)?;
        }
        if let Some(value) = lookup("LONGCAT_LOG_LEVEL") {
            self.features.log_level = value;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{name} has an invalid value '{value}'")))
}

fn parse_env_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}

/// Parse a YAML document into a config without validating it.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

/// Load configuration: defaults, then the optional YAML file, then the
/// process environment. The result is validated.
///
/// The file path comes from `LONGCAT_CONFIG`, falling back to `config.yaml`
/// in the working directory. A missing default file is not an error; a
/// missing explicitly named file is.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] / [`ConfigError::Yaml`] for file problems,
/// [`ConfigError::MissingApiKey`] when no key is configured, or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let explicit_path = std::env::var(CONFIG_PATH_ENV).ok();
    let path = explicit_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut config = match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)?,
        Err(err) if explicit_path.is_none() && err.kind() == std::io::ErrorKind::NotFound => {
            AppConfig::default()
        }
        Err(err) => return Err(err.into()),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_match_bridge_constants() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.timeout, 120);
        assert_eq!(config.upstream.base_url, "https://api.longcat.chat/openai");
        assert_eq!(config.upstream.model, "longcat-flash-thinking");
        assert_eq!(config.upstream.max_tokens, 8192);
        assert!(!config.features.show_reasoning);
        assert_eq!(config.features.done_delay_ms, 100);
    }

    #[test]
    fn test_parse_partial_yaml_keeps_defaults() {
        let config = parse_config(
            "upstream:\n  api_key: file-key\nfeatures:\n  show_reasoning: true\n",
        )
        .unwrap();
        assert_eq!(config.upstream.api_key, "file-key");
        assert_eq!(config.upstream.max_tokens, 8192);
        assert!(config.features.show_reasoning);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_parse_empty_yaml_is_default() {
        let config = parse_config("  \n").unwrap();
        assert_eq!(config.upstream.model, "longcat-flash-thinking");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = parse_config("upstream:\n  api_key: file-key\n").unwrap();
        config
            .apply_env(lookup_from(&[
                ("LONGCAT_API_KEY", "env-key"),
                ("LONGBASE", "http://127.0.0.1:9000"),
                ("LONGCAT_PORT", "9100"),
                ("LONGCAT_SHOW_THINKING", "true"),
            ]))
            .unwrap();
        assert_eq!(config.upstream.api_key, "env-key");
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.server.port, 9100);
        assert!(config.features.show_reasoning);
    }

    #[test]
    fn test_env_rejects_bad_port() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("LONGCAT_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_env_rejects_bad_bool() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("LONGCAT_SHOW_THINKING", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = AppConfig::default();
        config.upstream.api_key = "secret".into();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }
}
