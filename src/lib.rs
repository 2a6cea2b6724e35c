#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ephemeral PostgreSQL Harness
//!
//! Integration test harness that runs transactional scenarios against a disposable PostgreSQL
//! instance.
//!
//! ## Overview
//!
//! A test session provisions one database (a throwaway container, or an externally managed
//! instance in CI), binds a connection pool to it, and then runs scenarios one at a time. Each
//! scenario starts from a known baseline fixture and the table is cleared after it, whether the
//! scenario passed, failed or panicked. At the end the pool is closed before the database is
//! stopped.
//!
//! ## Module Organization
//!
//! - [`provisioner`] - Start, discover and stop the database
//! - [`persistence`] - Connection pool, schema lifecycle, units of work
//! - [`session`] - Session lifecycle, fixture isolation, reports
//! - [`scenarios`] - Canonical create / delete scenarios
//! - [`models`] - The `Customer` entity
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ephemeral_harness::config::ConfigManager;
//! use ephemeral_harness::scenarios::canonical_scenarios;
//! use ephemeral_harness::session::TestSession;
//!
//! # async fn example() -> ephemeral_harness::HarnessResult<()> {
//! ephemeral_harness::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//!
//! let report = TestSession::run(manager.config(), &canonical_scenarios()).await?;
//! println!("{}", report.summary());
//! report.into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                 # Unit tests, no database needed
//! cargo test -- --include-ignored  # Also the Docker-backed lifecycle tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod provisioner;
pub mod scenarios;
pub mod session;

pub use config::{ConfigManager, HarnessConfig, IsolationMode, SchemaMode};
pub use error::{HarnessError, HarnessResult};
pub use models::{Customer, NewCustomer};
pub use persistence::{PersistenceBinding, PersistenceOptions, UnitOfWork};
pub use provisioner::{ConnectionInfo, DatabaseProvisioner, EphemeralPostgres, ExternalDatabase};
pub use session::{Scenario, ScenarioContext, SuiteReport, TestSession};
