//! # Disposable PostgreSQL Container
//!
//! Stock PostgreSQL image started through testcontainers, one container per test session.
//! Image name, tag and credentials are configuration, not constants.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ContainerRequest, GenericImage, ImageExt};
use tokio::time::Instant;
use tracing::{info, warn};

use super::{wait_until_reachable, ConnectionInfo, DatabaseProvisioner};
use crate::config::ProvisionerConfig;
use crate::constants::{defaults, POSTGRES_PORT, POSTGRES_READY_MESSAGE};
use crate::error::{HarnessError, HarnessResult};

const ENV_DB: &str = "POSTGRES_DB";
const ENV_USER: &str = "POSTGRES_USER";
const ENV_PASSWORD: &str = "POSTGRES_PASSWORD";

pub struct EphemeralPostgres {
    image: String,
    tag: String,
    env_vars: HashMap<String, String>,
    startup_timeout: Duration,
    container: Option<ContainerAsync<GenericImage>>,
    connection_info: Option<ConnectionInfo>,
}

impl Default for EphemeralPostgres {
    fn default() -> Self {
        let mut env_vars = HashMap::new();
        env_vars.insert(ENV_DB.to_string(), defaults::DATABASE.to_string());
        env_vars.insert(ENV_USER.to_string(), defaults::USERNAME.to_string());
        env_vars.insert(ENV_PASSWORD.to_string(), defaults::PASSWORD.to_string());

        Self {
            image: defaults::IMAGE.to_string(),
            tag: defaults::TAG.to_string(),
            env_vars,
            startup_timeout: Duration::from_secs(defaults::STARTUP_TIMEOUT_SECONDS),
            container: None,
            connection_info: None,
        }
    }
}

impl std::fmt::Debug for EphemeralPostgres {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralPostgres")
            .field("image", &format!("{}:{}", self.image, self.tag))
            .field("database", &self.env(ENV_DB))
            .field("username", &self.env(ENV_USER))
            .field("startup_timeout", &self.startup_timeout)
            .field("running", &self.container.is_some())
            .finish()
    }
}

impl EphemeralPostgres {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self::new()
            .with_image(&config.image, &config.tag)
            .with_db_name(&config.database)
            .with_user(&config.username)
            .with_password(&config.password)
            .with_startup_timeout(config.startup_timeout())
    }

    pub fn with_image(mut self, image: &str, tag: &str) -> Self {
        self.image = image.to_string();
        self.tag = tag.to_string();
        self
    }

    pub fn with_db_name(mut self, db_name: &str) -> Self {
        self.env_vars.insert(ENV_DB.to_string(), db_name.to_string());
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.env_vars.insert(ENV_USER.to_string(), user.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.env_vars.insert(ENV_PASSWORD.to_string(), password.to_string());
        self
    }

    /// Upper bound for container start plus the first successful connection
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    fn env(&self, key: &str) -> &str {
        self.env_vars.get(key).map(String::as_str).unwrap_or_default()
    }

    fn container_request(&self) -> ContainerRequest<GenericImage> {
        let base_request: ContainerRequest<GenericImage> =
            GenericImage::new(self.image.clone(), self.tag.clone())
                .with_exposed_port(POSTGRES_PORT.tcp())
                .with_wait_for(WaitFor::message_on_stderr(POSTGRES_READY_MESSAGE))
                .into();

        self.env_vars
            .iter()
            .fold(base_request, |req, (key, value)| req.with_env_var(key, value))
            .with_startup_timeout(self.startup_timeout)
    }

    async fn discover(&self, container: &ContainerAsync<GenericImage>) -> HarnessResult<ConnectionInfo> {
        let host = container
            .get_host()
            .await
            .map_err(|e| HarnessError::Provision(format!("failed to resolve container host: {e}")))?;
        let port = container
            .get_host_port_ipv4(POSTGRES_PORT.tcp())
            .await
            .map_err(|e| HarnessError::Provision(format!("failed to resolve mapped port: {e}")))?;

        Ok(ConnectionInfo::new(
            host.to_string(),
            port,
            self.env(ENV_DB),
            self.env(ENV_USER),
            self.env(ENV_PASSWORD),
        ))
    }
}

#[async_trait]
impl DatabaseProvisioner for EphemeralPostgres {
    async fn start(&mut self) -> HarnessResult<()> {
        if self.container.is_some() {
            return Err(HarnessError::Provision(format!(
                "{} is already running",
                self.describe()
            )));
        }

        info!(
            image = %format!("{}:{}", self.image, self.tag),
            timeout_secs = self.startup_timeout.as_secs(),
            "📦 Starting PostgreSQL container"
        );

        let started_at = Instant::now();
        let container = tokio::time::timeout(self.startup_timeout, self.container_request().start())
            .await
            .map_err(|_| {
                HarnessError::Provision(format!(
                    "{} did not start within {:?}",
                    self.describe(),
                    self.startup_timeout
                ))
            })?
            .map_err(|e| HarnessError::Provision(format!("failed to start {}: {e}", self.describe())))?;

        let connection_info = match self.discover(&container).await {
            Ok(info) => info,
            Err(e) => {
                discard(container).await;
                return Err(e);
            }
        };

        let remaining = self.startup_timeout.saturating_sub(started_at.elapsed());
        if let Err(e) = wait_until_reachable(&connection_info, remaining).await {
            discard(container).await;
            return Err(e);
        }

        info!(
            container_id = %container.id(),
            host = %connection_info.host,
            port = connection_info.port,
            database = %connection_info.database,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "✅ PostgreSQL container ready"
        );

        self.container = Some(container);
        self.connection_info = Some(connection_info);
        Ok(())
    }

    fn connection_info(&self) -> HarnessResult<&ConnectionInfo> {
        self.connection_info.as_ref().ok_or_else(|| {
            HarnessError::Provision(format!("{} has not been started", self.describe()))
        })
    }

    async fn stop(&mut self) -> HarnessResult<()> {
        self.connection_info = None;
        let Some(container) = self.container.take() else {
            return Ok(());
        };

        let container_id = container.id().to_string();
        container.rm().await.map_err(|e| {
            HarnessError::Provision(format!("failed to remove container {container_id}: {e}"))
        })?;

        info!(container_id = %container_id, "🧹 PostgreSQL container removed");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.container.is_some()
    }

    fn describe(&self) -> String {
        format!("container {}:{}", self.image, self.tag)
    }
}

async fn discard(container: ContainerAsync<GenericImage>) {
    let container_id = container.id().to_string();
    if let Err(e) = container.rm().await {
        warn!(container_id = %container_id, error = %e, "Failed to remove container after failed start");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_container_config() {
        let postgres = EphemeralPostgres::new()
            .with_image("postgres", "16-alpine")
            .with_db_name("test_db")
            .with_user("test_user")
            .with_password("test_pass");

        assert_eq!(postgres.env_vars.get("POSTGRES_DB"), Some(&"test_db".to_string()));
        assert_eq!(postgres.env_vars.get("POSTGRES_USER"), Some(&"test_user".to_string()));
        assert_eq!(postgres.env_vars.get("POSTGRES_PASSWORD"), Some(&"test_pass".to_string()));
        assert_eq!(postgres.describe(), "container postgres:16-alpine");
    }

    #[test]
    fn test_from_config_uses_configured_tag() {
        let config = ProvisionerConfig {
            tag: "14".to_string(),
            startup_timeout_seconds: 5,
            ..ProvisionerConfig::default()
        };
        let postgres = EphemeralPostgres::from_config(&config);
        assert_eq!(postgres.tag, "14");
        assert_eq!(postgres.startup_timeout, Duration::from_secs(5));
        assert_eq!(postgres.env(ENV_DB), "testdb");
    }

    #[test]
    fn test_debug_omits_password() {
        let postgres = EphemeralPostgres::new().with_password("topsecret");
        assert!(!format!("{postgres:?}").contains("topsecret"));
    }

    #[tokio::test]
    async fn test_connection_info_requires_start() {
        let postgres = EphemeralPostgres::new();
        assert!(matches!(
            postgres.connection_info(),
            Err(HarnessError::Provision(_))
        ));
        assert!(!postgres.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_without_start() {
        let mut postgres = EphemeralPostgres::new();
        postgres.stop().await.unwrap();
        postgres.stop().await.unwrap();
        assert!(!postgres.is_running());
    }
}
