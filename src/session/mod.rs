//! # Test Session
//!
//! Drives a whole suite against one provisioned database:
//!
//! ```text
//! SuiteStart → (FixtureSeed → Scenario → FixtureTeardown)* → SuiteEnd
//! ```
//!
//! ## Key Components
//!
//! - [`controller`] - [`TestSession`]: provisioning, binding, per-scenario lifecycle, shutdown
//! - [`phase`] - [`SessionPhase`] and its transition table
//! - [`scenario`] - [`Scenario`] bodies and the [`ScenarioContext`] they receive
//! - [`report`] - Per-scenario and per-suite outcomes
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ephemeral_harness::config::HarnessConfig;
//! use ephemeral_harness::scenarios::canonical_scenarios;
//! use ephemeral_harness::session::TestSession;
//!
//! # async fn example() -> ephemeral_harness::HarnessResult<()> {
//! let report = TestSession::run(&HarnessConfig::default(), &canonical_scenarios()).await?;
//! assert!(report.all_passed(), "{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod phase;
pub mod report;
pub mod scenario;

pub use controller::TestSession;
pub use phase::SessionPhase;
pub use report::{ScenarioReport, ScenarioStatus, SuiteReport};
pub use scenario::{Scenario, ScenarioContext, ScenarioFuture};
