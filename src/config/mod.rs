//! # Harness Configuration System
//!
//! Layered configuration for the provisioner, the persistence binding and the session
//! controller. Values come from built-in defaults, then `config/harness.toml`, then
//! `config/harness.<environment>.toml`, then `HARNESS__<SECTION>__<KEY>` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ephemeral_harness::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let tag = &manager.config().provisioner.tag;
//! let pool_size = manager.config().persistence.pool_size;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::{defaults, SUPPORTED_DRIVERS};
use crate::error::{HarnessError, HarnessResult};
use crate::models::NewCustomer;

pub use loader::ConfigManager;

/// Root configuration structure mirroring harness.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Where the database comes from and how long it may take to boot
    pub provisioner: ProvisionerConfig,

    /// Named persistence unit: driver, credentials, schema management, pool
    pub persistence: PersistenceConfig,

    /// Fixture seeding and isolation between scenarios
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerMode {
    /// Start a disposable container for the session
    #[default]
    Container,
    /// Use an already-running database (CI service containers)
    External,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub mode: ProvisionerMode,
    pub image: String,
    pub tag: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub startup_timeout_seconds: u64,
    /// Only read in external mode; falls back to `DATABASE_URL`
    pub external_url: Option<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            mode: ProvisionerMode::Container,
            image: defaults::IMAGE.to_string(),
            tag: defaults::TAG.to_string(),
            database: defaults::DATABASE.to_string(),
            username: defaults::USERNAME.to_string(),
            password: defaults::PASSWORD.to_string(),
            startup_timeout_seconds: defaults::STARTUP_TIMEOUT_SECONDS,
            external_url: None,
        }
    }
}

impl ProvisionerConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }
}

/// How the binding manages the entity table when it opens and closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaMode {
    /// Drop and recreate on open
    #[default]
    Create,
    /// Drop and recreate on open, drop again on close
    CreateDrop,
    /// Create when absent, keep existing rows
    Update,
    /// Require the table and its columns to exist
    Validate,
    /// Touch nothing; the table must already exist
    None,
}

impl SchemaMode {
    pub fn auto_creates(&self) -> bool {
        matches!(
            self,
            SchemaMode::Create | SchemaMode::CreateDrop | SchemaMode::Update
        )
    }
}

impl fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaMode::Create => write!(f, "create"),
            SchemaMode::CreateDrop => write!(f, "create-drop"),
            SchemaMode::Update => write!(f, "update"),
            SchemaMode::Validate => write!(f, "validate"),
            SchemaMode::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub unit_name: String,
    pub driver: String,
    /// Static connection URL; replaced by runtime coordinates at session start
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schema_mode: SchemaMode,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            unit_name: defaults::UNIT_NAME.to_string(),
            driver: defaults::DRIVER.to_string(),
            url: None,
            username: None,
            password: None,
            schema_mode: SchemaMode::default(),
            pool_size: defaults::POOL_SIZE,
            acquire_timeout_seconds: defaults::ACQUIRE_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// Clear the table and seed the baseline fixture before every scenario
    #[default]
    PerTest,
    /// Clear the table before every scenario but seed no fixture
    PerSuite,
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::PerTest => write!(f, "per-test"),
            IsolationMode::PerSuite => write!(f, "per-suite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub isolation: IsolationMode,
    pub fixture: NewCustomer,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationMode::PerTest,
            fixture: NewCustomer::new(
                defaults::FIXTURE_FIRST_NAME,
                defaults::FIXTURE_LAST_NAME,
                defaults::FIXTURE_EMAIL,
            ),
        }
    }
}

impl HarnessConfig {
    /// Reject values the harness cannot run with
    pub fn validate(&self) -> HarnessResult<()> {
        let required = [
            ("provisioner.image", &self.provisioner.image),
            ("provisioner.tag", &self.provisioner.tag),
            ("provisioner.database", &self.provisioner.database),
            ("provisioner.username", &self.provisioner.username),
            ("persistence.unit_name", &self.persistence.unit_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(HarnessError::Configuration(format!(
                    "{field} must not be empty"
                )));
            }
        }

        if self.provisioner.startup_timeout_seconds == 0 {
            return Err(HarnessError::Configuration(
                "provisioner.startup_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.persistence.pool_size == 0 {
            return Err(HarnessError::Configuration(
                "persistence.pool_size must be greater than 0".to_string(),
            ));
        }

        if !SUPPORTED_DRIVERS.contains(&self.persistence.driver.as_str()) {
            return Err(HarnessError::Configuration(format!(
                "persistence.driver '{}' is not supported (expected one of {SUPPORTED_DRIVERS:?})",
                self.persistence.driver
            )));
        }

        if self.session.isolation == IsolationMode::PerTest
            && self.session.fixture.email.trim().is_empty()
        {
            return Err(HarnessError::Configuration(
                "session.fixture.email is required for per-test isolation".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_container() {
        let config = HarnessConfig::default();
        assert_eq!(config.provisioner.image, "postgres");
        assert_eq!(config.provisioner.tag, "15.3");
        assert_eq!(config.provisioner.database, "testdb");
        assert_eq!(config.provisioner.username, "root");
        assert_eq!(config.persistence.unit_name, "my-persistence");
        assert_eq!(config.persistence.schema_mode, SchemaMode::Create);
        assert_eq!(config.session.isolation, IsolationMode::PerTest);
        assert_eq!(config.session.fixture.email, "initial.user@example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_pool() {
        let mut config = HarnessConfig::default();
        config.persistence.pool_size = 0;
        assert!(matches!(
            config.validate(),
            Err(HarnessError::Configuration(msg)) if msg.contains("pool_size")
        ));
    }

    #[test]
    fn test_validation_rejects_unknown_driver() {
        let mut config = HarnessConfig::default();
        config.persistence.driver = "mysql".to_string();
        assert!(config.validate().is_err());

        config.persistence.driver = "org.postgresql.Driver".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_tag() {
        let mut config = HarnessConfig::default();
        config.provisioner.tag = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_suite_does_not_need_fixture() {
        let mut config = HarnessConfig::default();
        config.session.isolation = IsolationMode::PerSuite;
        config.session.fixture.email = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_schema_mode_serde_names() {
        let mode: SchemaMode = serde_json::from_str("\"create-drop\"").unwrap();
        assert_eq!(mode, SchemaMode::CreateDrop);
        assert_eq!(mode.to_string(), "create-drop");
        assert!(mode.auto_creates());
        assert!(!SchemaMode::Validate.auto_creates());
        assert!(!SchemaMode::None.auto_creates());
    }
}
