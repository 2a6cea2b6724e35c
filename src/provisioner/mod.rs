//! # Ephemeral Database Provisioning
//!
//! A provisioner owns one database instance for the lifetime of a test session. It boots the
//! instance, blocks until it accepts TCP connections, hands out the coordinates the persistence
//! binding connects with, and tears the instance down again.
//!
//! ```text
//! DatabaseProvisioner
//! ├── EphemeralPostgres   # disposable container per session (testcontainers)
//! └── ExternalDatabase    # an already-running server, e.g. a CI service container
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ephemeral_harness::provisioner::{DatabaseProvisioner, EphemeralPostgres};
//!
//! # async fn example() -> ephemeral_harness::HarnessResult<()> {
//! let mut postgres = EphemeralPostgres::new()
//!     .with_db_name("testdb")
//!     .with_user("root")
//!     .with_password("password");
//!
//! postgres.start().await?;
//! let url = postgres.connection_info()?.connection_url();
//! // ... bind a persistence layer to `url` ...
//! postgres.stop().await?;
//! postgres.stop().await?; // no-op
//! # Ok(())
//! # }
//! ```

pub mod external;
pub mod postgres_container;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{ProvisionerConfig, ProvisionerMode};
use crate::constants::{POSTGRES_PORT, READINESS_PROBE_INTERVAL};
use crate::error::{HarnessError, HarnessResult};

pub use external::ExternalDatabase;
pub use postgres_container::EphemeralPostgres;

/// Lifecycle of one database instance owned by a test session
#[async_trait]
pub trait DatabaseProvisioner: Send + Sync {
    /// Boot the instance and wait until it accepts connections
    async fn start(&mut self) -> HarnessResult<()>;

    /// Coordinates of the running instance; an error before a successful `start`
    fn connection_info(&self) -> HarnessResult<&ConnectionInfo>;

    /// Tear the instance down; calling it twice, or before `start`, does nothing
    async fn stop(&mut self) -> HarnessResult<()>;

    fn is_running(&self) -> bool;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Build the provisioner the configuration asks for
pub fn provisioner_from_config(config: &ProvisionerConfig) -> Box<dyn DatabaseProvisioner> {
    match config.mode {
        ProvisionerMode::Container => Box::new(EphemeralPostgres::from_config(config)),
        ProvisionerMode::External => Box::new(ExternalDatabase::from_config(config)),
    }
}

/// Host, port, database name and credentials of a reachable database
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    password: String,
}

impl ConnectionInfo {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse a `postgres://` or `postgresql://` URL
    pub fn from_url(raw: &str) -> HarnessResult<Self> {
        let invalid = |reason: String| HarnessError::Provision(format!("invalid database URL: {reason}"));

        let parsed = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let database = parsed.path().trim_start_matches('/');
        if database.is_empty() {
            return Err(invalid("missing database name".to_string()));
        }

        let decode = |part: &str| -> HarnessResult<String> {
            percent_decode_str(part)
                .decode_utf8()
                .map(|s| s.into_owned())
                .map_err(|e| invalid(e.to_string()))
        };

        Ok(Self {
            host: host.to_string(),
            port: parsed.port().unwrap_or(POSTGRES_PORT),
            database: decode(database)?,
            username: decode(parsed.username())?,
            password: decode(parsed.password().unwrap_or_default())?,
        })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Full URL including the password
    pub fn connection_url(&self) -> String {
        self.build_url(Some(&self.password))
    }

    /// URL with the password replaced, safe for logs
    pub fn redacted_url(&self) -> String {
        self.build_url(None)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }

    fn build_url(&self, password: Option<&str>) -> String {
        let password = password.unwrap_or("***");
        let base = format!("postgresql://{}:{}/", self.host, self.port);
        let Ok(mut url) = url::Url::parse(&base) else {
            return self.format_url(password);
        };
        if url.set_username(&self.username).is_err() || url.set_password(Some(password)).is_err() {
            return self.format_url(password);
        }
        url.set_path(&format!("/{}", self.database));
        url.to_string()
    }

    fn format_url(&self, password: &str) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, password, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted_url())
    }
}

/// Probe with real connections until one succeeds or `timeout` elapses
pub async fn wait_until_reachable(info: &ConnectionInfo, timeout: Duration) -> HarnessResult<()> {
    let deadline = Instant::now() + timeout;
    let options = info.connect_options();
    let mut attempts = 0_u32;

    loop {
        attempts += 1;
        // A server that accepts the socket but never answers must not outlive the deadline
        let budget = deadline.saturating_duration_since(Instant::now());
        let attempt = match tokio::time::timeout(budget, PgConnection::connect_with(&options)).await
        {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("connection attempt timed out".to_string()),
        };

        match attempt {
            Ok(conn) => {
                let _ = conn.close().await;
                debug!(
                    database = %info,
                    attempts = attempts,
                    "Database instance is accepting connections"
                );
                return Ok(());
            }
            Err(e) if Instant::now() + READINESS_PROBE_INTERVAL >= deadline => {
                return Err(HarnessError::Provision(format!(
                    "{info} not reachable within {timeout:?} ({attempts} attempts): {e}"
                )));
            }
            Err(e) => {
                debug!(attempt = attempts, error = %e, "Database not reachable yet");
                tokio::time::sleep(READINESS_PROBE_INTERVAL).await;
            }
        }
    }
}
