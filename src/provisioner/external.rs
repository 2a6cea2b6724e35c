//! # External Database
//!
//! Binds the harness to a database somebody else started, typically a CI service container.
//! Nothing is booted or torn down; `start` only checks reachability.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{wait_until_reachable, ConnectionInfo, DatabaseProvisioner};
use crate::config::ProvisionerConfig;
use crate::constants::{defaults, env as env_vars};
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug)]
pub struct ExternalDatabase {
    url: Option<String>,
    startup_timeout: Duration,
    connection_info: Option<ConnectionInfo>,
}

impl ExternalDatabase {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            startup_timeout: Duration::from_secs(defaults::STARTUP_TIMEOUT_SECONDS),
            connection_info: None,
        }
    }

    /// `external_url` from configuration, else `DATABASE_URL`
    pub fn from_config(config: &ProvisionerConfig) -> Self {
        let url = config
            .external_url
            .clone()
            .or_else(|| std::env::var(env_vars::DATABASE_URL).ok());

        Self {
            url,
            startup_timeout: config.startup_timeout(),
            connection_info: None,
        }
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

#[async_trait]
impl DatabaseProvisioner for ExternalDatabase {
    async fn start(&mut self) -> HarnessResult<()> {
        if self.connection_info.is_some() {
            return Err(HarnessError::Provision(
                "external database is already started".to_string(),
            ));
        }

        let url = self.url.as_deref().ok_or_else(|| {
            HarnessError::Provision(format!(
                "no external database URL configured (set provisioner.external_url or {})",
                env_vars::DATABASE_URL
            ))
        })?;
        let connection_info = ConnectionInfo::from_url(url)?;

        wait_until_reachable(&connection_info, self.startup_timeout).await?;
        info!(database = %connection_info, "Using external database");

        self.connection_info = Some(connection_info);
        Ok(())
    }

    fn connection_info(&self) -> HarnessResult<&ConnectionInfo> {
        self.connection_info.as_ref().ok_or_else(|| {
            HarnessError::Provision("external database has not been started".to_string())
        })
    }

    async fn stop(&mut self) -> HarnessResult<()> {
        self.connection_info = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.connection_info.is_some()
    }

    fn describe(&self) -> String {
        match self.url.as_deref().map(ConnectionInfo::from_url) {
            Some(Ok(info)) => format!("external {info}"),
            Some(Err(_)) => "external <invalid url>".to_string(),
            None => "external <unset>".to_string(),
        }
    }
}
