//! # Harness Constants
//!
//! Defaults shared by the configuration layer, the provisioner and the persistence binding.

use std::time::Duration;

/// Port PostgreSQL listens on inside the container
pub const POSTGRES_PORT: u16 = 5432;

/// Log line PostgreSQL writes to stderr once it accepts connections
pub const POSTGRES_READY_MESSAGE: &str = "database system is ready to accept connections";

/// Interval between connection probes while waiting for a fresh instance
pub const READINESS_PROBE_INTERVAL: Duration = Duration::from_millis(250);

pub mod defaults {
    pub const IMAGE: &str = "postgres";
    pub const TAG: &str = "15.3";
    pub const DATABASE: &str = "testdb";
    pub const USERNAME: &str = "root";
    pub const PASSWORD: &str = "password";
    pub const STARTUP_TIMEOUT_SECONDS: u64 = 60;

    pub const UNIT_NAME: &str = "my-persistence";
    pub const DRIVER: &str = "postgres";
    pub const POOL_SIZE: u32 = 5;
    pub const ACQUIRE_TIMEOUT_SECONDS: u64 = 10;

    pub const FIXTURE_FIRST_NAME: &str = "Initial";
    pub const FIXTURE_LAST_NAME: &str = "User";
    pub const FIXTURE_EMAIL: &str = "initial.user@example.com";
}

/// Driver identifiers the persistence binding can serve
pub const SUPPORTED_DRIVERS: &[&str] = &["postgres", "postgresql", "org.postgresql.Driver"];

/// Environment variables the harness reads
pub mod env {
    pub const HARNESS_ENV: &str = "HARNESS_ENV";
    pub const APP_ENV: &str = "APP_ENV";
    pub const CONFIG_DIR: &str = "HARNESS_CONFIG_DIR";
    pub const LOG_FORMAT: &str = "HARNESS_LOG_FORMAT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const SKIP_CONTAINER_TESTS: &str = "SKIP_CONTAINER_TESTS";
}
