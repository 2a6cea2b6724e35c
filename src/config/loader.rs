//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles config directory discovery, environment
//! detection, layering of TOML files and environment variables, and masked logging.

use super::HarnessConfig;
use crate::constants::env as env_vars;
use crate::error::{HarnessError, HarnessResult};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the configuration files inside the config directory
const CONFIG_FILE_STEM: &str = "harness";

/// Prefix of the environment variables that override configuration keys
const ENV_PREFIX: &str = "HARNESS";

/// Loaded, validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: HarnessConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> HarnessResult<Arc<ConfigManager>> {
        dotenvy::dotenv().ok();
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> HarnessResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> HarnessResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading harness configuration"
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            image = %format!("{}:{}", config.provisioner.image, config.provisioner.tag),
            schema_mode = %config.persistence.schema_mode,
            pool_size = config.persistence.pool_size,
            isolation = %config.session.isolation,
            "Configuration loaded successfully"
        );
        debug!(
            "Effective configuration: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: HarnessConfig, environment: &str) -> HarnessResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with secrets masked, safe to print
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn load_layers(config_directory: &Path, environment: &str) -> HarnessResult<HarnessConfig> {
        let base = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let overlay = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        debug!(
            base = %base.display(),
            base_present = base.exists(),
            overlay = %overlay.display(),
            overlay_present = overlay.exists(),
            "Resolving configuration layers"
        );

        let layered = ::config::Config::builder()
            .add_source(::config::File::from(base).required(false))
            .add_source(::config::File::from(overlay).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        layered
            .try_deserialize::<HarnessConfig>()
            .map_err(|e| HarnessError::Configuration(format!("Failed to deserialize configuration: {e}")))
    }

    /// Detect current environment: HARNESS_ENV || APP_ENV || 'test'
    pub fn detect_environment() -> String {
        env::var(env_vars::HARNESS_ENV)
            .or_else(|_| env::var(env_vars::APP_ENV))
            .unwrap_or_else(|_| "test".to_string())
            .to_lowercase()
    }

    /// HARNESS_CONFIG_DIR, else `<CARGO_MANIFEST_DIR>/config`, else `./config`
    fn default_config_directory() -> PathBuf {
        if let Ok(dir) = env::var(env_vars::CONFIG_DIR) {
            return PathBuf::from(dir);
        }

        if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
            let candidate = PathBuf::from(manifest_dir).join("config");
            if candidate.exists() {
                return candidate;
            }
        }

        PathBuf::from("config")
    }

    /// Sanitize configuration for safe logging by masking sensitive fields
    pub fn sanitize_config_for_logging(config: &HarnessConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);

        // Static URLs may embed credentials
        if let Some(url) = config_json
            .pointer_mut("/persistence/url")
            .filter(|v| v.is_string())
        {
            *url = serde_json::Value::String("[MASKED]".to_string());
        }
        if let Some(url) = config_json
            .pointer_mut("/provisioner/external_url")
            .filter(|v| v.is_string())
        {
            *url = serde_json::Value::String("[MASKED]".to_string());
        }

        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = match val {
                            serde_json::Value::Null => serde_json::Value::Null,
                            serde_json::Value::String(s) => {
                                serde_json::Value::String(mask_secret(s))
                            }
                            _ => serde_json::Value::String("[MASKED]".to_string()),
                        };
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}

/// Shortest secret whose first and last two characters may be shown
const MASK_REVEAL_MIN_LEN: usize = 8;

/// Mask a secret, keeping only enough of a long one to tell two values apart
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "[EMPTY]".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    let masked = if chars.len() >= MASK_REVEAL_MIN_LEN {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{head}***{tail}")
    } else {
        "***".to_string()
    };
    format!("[MASKED: {masked}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "[EMPTY]");
        assert_eq!(mask_secret("abc"), "[MASKED: ***]");
        assert_eq!(mask_secret("abcde"), "[MASKED: ***]");
        assert_eq!(mask_secret("hunter2"), "[MASKED: ***]");
        assert_eq!(mask_secret("password"), "[MASKED: pa***rd]");
    }

    #[test]
    fn test_sanitized_config_hides_passwords() {
        let mut config = HarnessConfig::default();
        config.persistence.password = Some("hunter22".to_string());
        config.persistence.url = Some("postgresql://root:hunter22@db:5432/testdb".to_string());

        let sanitized = ConfigManager::sanitize_config_for_logging(&config);
        let rendered = sanitized.to_string();

        assert!(!rendered.contains("hunter22"));
        assert_eq!(sanitized["provisioner"]["password"], "[MASKED: pa***rd]");
        assert_eq!(sanitized["persistence"]["url"], "[MASKED]");
        assert_eq!(sanitized["provisioner"]["username"], "root");
        assert!(sanitized["provisioner"]["external_url"].is_null());
    }

    #[test]
    fn test_missing_directory_falls_back_to_defaults() {
        let manager = ConfigManager::load_from_directory_with_env(
            Some(PathBuf::from("/nonexistent/harness-config")),
            "test",
        )
        .unwrap();
        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().provisioner.tag, "15.3");
    }
}
