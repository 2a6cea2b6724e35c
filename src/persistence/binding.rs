//! # Persistence Binding
//!
//! Session-wide connection pool bound to the provisioned database. Produces units of work,
//! owns the schema lifecycle, and is closed exactly once at the end of the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, warn};

use super::{schema, UnitOfWork};
use crate::config::{PersistenceConfig, SchemaMode};
use crate::constants::SUPPORTED_DRIVERS;
use crate::error::{HarnessError, HarnessResult};
use crate::provisioner::ConnectionInfo;

/// Options of one named persistence unit
#[derive(Clone)]
pub struct PersistenceOptions {
    pub unit_name: String,
    pub driver: String,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schema_mode: SchemaMode,
    pub pool_size: u32,
    pub acquire_timeout: Duration,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self::from_config(&PersistenceConfig::default())
    }
}

impl std::fmt::Debug for PersistenceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceOptions")
            .field("unit_name", &self.unit_name)
            .field("driver", &self.driver)
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("schema_mode", &self.schema_mode)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl PersistenceOptions {
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self {
            unit_name: config.unit_name.clone(),
            driver: config.driver.clone(),
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            schema_mode: config.schema_mode,
            pool_size: config.pool_size,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_seconds),
        }
    }

    /// Replace the static URL and credentials with coordinates discovered at runtime
    pub fn with_connection_info(mut self, info: &ConnectionInfo) -> Self {
        self.url = Some(info.connection_url());
        self.username = Some(info.username.clone());
        self.password = Some(info.password().to_string());
        self
    }

    pub fn with_schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Where the pool connects: the URL, with explicit credentials taking precedence
    pub fn target(&self) -> HarnessResult<ConnectionInfo> {
        if !SUPPORTED_DRIVERS.contains(&self.driver.as_str()) {
            return Err(HarnessError::Binding(format!(
                "unit '{}': driver '{}' is not supported",
                self.unit_name, self.driver
            )));
        }

        let url = self.url.as_deref().ok_or_else(|| {
            HarnessError::Binding(format!("unit '{}': no connection URL", self.unit_name))
        })?;
        let parsed = ConnectionInfo::from_url(url).map_err(|e| {
            HarnessError::Binding(format!("unit '{}': {e}", self.unit_name))
        })?;

        Ok(ConnectionInfo::new(
            parsed.host.clone(),
            parsed.port,
            parsed.database.clone(),
            self.username.clone().unwrap_or_else(|| parsed.username.clone()),
            self.password
                .clone()
                .unwrap_or_else(|| parsed.password().to_string()),
        ))
    }
}

pub struct PersistenceBinding {
    pool: PgPool,
    options: PersistenceOptions,
    target: ConnectionInfo,
    closed: AtomicBool,
}

impl std::fmt::Debug for PersistenceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBinding")
            .field("unit_name", &self.options.unit_name)
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PersistenceBinding {
    /// Bind to a provisioned database; runtime coordinates override any static URL
    pub async fn open(info: &ConnectionInfo, options: PersistenceOptions) -> HarnessResult<Self> {
        Self::open_static(options.with_connection_info(info)).await
    }

    /// Bind using only the statically configured URL and credentials
    pub async fn open_static(options: PersistenceOptions) -> HarnessResult<Self> {
        let target = options.target()?;
        let pool_size = options.pool_size;
        if pool_size == 0 {
            return Err(HarnessError::Binding(format!(
                "unit '{}': pool size must be greater than 0",
                options.unit_name
            )));
        }

        let connect_options: PgConnectOptions = target.connect_options();
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                HarnessError::Binding(format!(
                    "unit '{}' could not connect to {target}: {e}",
                    options.unit_name
                ))
            })?;

        if let Err(e) = schema::apply(&pool, options.schema_mode).await {
            pool.close().await;
            return Err(e);
        }

        info!(
            unit = %options.unit_name,
            database = %target,
            pool_size = pool_size,
            schema_mode = %options.schema_mode,
            "🔌 Persistence binding opened"
        );

        Ok(Self {
            pool,
            options,
            target,
            closed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &PersistenceOptions {
        &self.options
    }

    pub fn target(&self) -> &ConnectionInfo {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, operation: &str) -> HarnessResult<()> {
        if self.is_closed() {
            Err(HarnessError::ClosedBinding(format!(
                "unit '{}' is closed; cannot {operation}",
                self.options.unit_name
            )))
        } else {
            Ok(())
        }
    }

    /// Fresh read-write unit of work on a pooled connection
    pub async fn new_unit_of_work(&self) -> HarnessResult<UnitOfWork> {
        self.ensure_open("open a unit of work")?;
        UnitOfWork::begin(&self.pool, false).await
    }

    /// Fresh read-only unit of work, for verifying what reached durable storage
    pub async fn new_read_only_unit_of_work(&self) -> HarnessResult<UnitOfWork> {
        self.ensure_open("open a read-only unit of work")?;
        UnitOfWork::begin(&self.pool, true).await
    }

    /// Release the pool; a second call is a [`HarnessError::ClosedBinding`]
    pub async fn close(&self) -> HarnessResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(HarnessError::ClosedBinding(format!(
                "unit '{}' was already closed",
                self.options.unit_name
            )));
        }

        let released = schema::release(&self.pool, self.options.schema_mode).await;
        if let Err(e) = &released {
            warn!(error = %e, "Schema release failed; closing pool anyway");
        }
        self.pool.close().await;

        info!(unit = %self.options.unit_name, "Persistence binding closed");
        released
    }
}
