//! # Test Session Controller
//!
//! Owns the provisioner and the persistence binding for one test session and drives the
//! per-scenario lifecycle: seed fixture, run scenario, tear fixture down. Teardown runs whatever
//! the scenario did, including panicking. Shutdown closes the binding before the database goes
//! away.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::phase::SessionPhase;
use super::report::{ScenarioReport, ScenarioStatus, SuiteReport};
use super::scenario::{Scenario, ScenarioContext};
use crate::config::{HarnessConfig, IsolationMode, SessionConfig};
use crate::error::{ensure_eq, HarnessError, HarnessResult};
use crate::logging::{log_error, log_scenario_outcome, log_session_phase};
use crate::models::Customer;
use crate::persistence::{PersistenceBinding, PersistenceOptions};
use crate::provisioner::{provisioner_from_config, DatabaseProvisioner};

pub struct TestSession {
    id: Uuid,
    provisioner: Box<dyn DatabaseProvisioner>,
    binding: Option<PersistenceBinding>,
    config: SessionConfig,
    phase: SessionPhase,
    fixture: Option<Customer>,
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("id", &self.id)
            .field("provisioner", &self.provisioner.describe())
            .field("binding", &self.binding)
            .field("phase", &self.phase)
            .field("isolation", &self.config.isolation)
            .finish()
    }
}

impl TestSession {
    /// SUITE_START from configuration: provision, then bind
    pub async fn start(config: &HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        Self::start_with(
            provisioner_from_config(&config.provisioner),
            PersistenceOptions::from_config(&config.persistence),
            config.session.clone(),
        )
        .await
    }

    /// SUITE_START with explicit collaborators
    pub async fn start_with(
        mut provisioner: Box<dyn DatabaseProvisioner>,
        options: PersistenceOptions,
        config: SessionConfig,
    ) -> HarnessResult<Self> {
        let id = Uuid::new_v4();
        info!(
            session_id = %id,
            provisioner = %provisioner.describe(),
            unit = %options.unit_name,
            isolation = %config.isolation,
            "🚀 Starting test session"
        );

        provisioner.start().await?;

        let bound = match provisioner.connection_info() {
            Ok(info) => PersistenceBinding::open(info, options).await,
            Err(e) => Err(e),
        };
        let binding = match bound {
            Ok(binding) => binding,
            Err(e) => {
                log_error("session", "bind", &e.to_string(), Some(&id.to_string()));
                if let Err(stop_err) = provisioner.stop().await {
                    log_error("session", "stop after failed bind", &stop_err.to_string(), None);
                }
                return Err(e);
            }
        };

        log_session_phase(&id.to_string(), "created", &SessionPhase::SuiteStarted.to_string(), None);

        Ok(Self {
            id,
            provisioner,
            binding: Some(binding),
            config,
            phase: SessionPhase::SuiteStarted,
            fixture: None,
        })
    }

    /// Start a session, run every scenario, shut down
    pub async fn run(config: &HarnessConfig, scenarios: &[Scenario]) -> HarnessResult<SuiteReport> {
        let mut session = Self::start(config).await?;
        let mut report = session.run_suite(scenarios).await;
        if let Err(e) = session.finish().await {
            report.shutdown_error = Some(e);
        }
        Ok(report)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn isolation(&self) -> IsolationMode {
        self.config.isolation
    }

    /// Baseline row seeded for the current scenario, if any
    pub fn fixture(&self) -> Option<&Customer> {
        self.fixture.as_ref()
    }

    pub fn binding(&self) -> HarnessResult<&PersistenceBinding> {
        self.binding
            .as_ref()
            .ok_or_else(|| HarnessError::ClosedBinding("session has been shut down".to_string()))
    }

    pub fn context(&self) -> HarnessResult<ScenarioContext<'_>> {
        Ok(ScenarioContext::new(
            self.binding()?,
            self.fixture.as_ref(),
            self.config.isolation,
        ))
    }

    fn advance(&mut self, next: SessionPhase) -> HarnessResult<()> {
        let from = self.phase;
        self.phase = from.transition(next)?;
        log_session_phase(&self.id.to_string(), &from.to_string(), &next.to_string(), None);
        Ok(())
    }

    /// FIXTURE_SEED: clear the table, insert the baseline fixture (per-test isolation), commit
    pub async fn seed_fixture(&mut self) -> HarnessResult<Option<Customer>> {
        self.phase.transition(SessionPhase::FixtureSeeded)?;

        let mut uow = self.binding()?.new_unit_of_work().await?;
        let cleared = uow.delete_all().await?;
        let fixture = match self.config.isolation {
            IsolationMode::PerTest => Some(uow.persist(&self.config.fixture).await?),
            IsolationMode::PerSuite => None,
        };
        uow.commit().await?;

        debug!(
            session_id = %self.id,
            cleared = cleared,
            fixture_id = fixture.as_ref().map(|c| c.id),
            "Fixture seeded"
        );

        self.fixture = fixture.clone();
        self.advance(SessionPhase::FixtureSeeded)?;
        Ok(fixture)
    }

    /// FIXTURE_TEARDOWN: delete every row, commit, verify the table is empty
    pub async fn teardown_fixture(&mut self) -> HarnessResult<u64> {
        // The phase moves even if the delete fails, so the next seed can still run
        self.advance(SessionPhase::FixtureTornDown)?;
        self.fixture = None;

        let binding = self.binding()?;
        let mut uow = binding.new_unit_of_work().await?;
        let removed = uow.delete_all().await?;
        uow.commit().await?;

        let mut verify = binding.new_read_only_unit_of_work().await?;
        let remaining = verify.count().await?;
        verify.rollback().await?;

        debug!(session_id = %self.id, removed = removed, "Fixture torn down");
        ensure_eq("rows remaining after teardown", 0, remaining)?;
        Ok(removed)
    }

    /// Seed, run, tear down; teardown runs no matter how the scenario ended
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        info!(session_id = %self.id, scenario = %scenario.name(), "▶️ Running scenario");

        let status = match self.seed_fixture().await {
            Err(e) => ScenarioStatus::Aborted(e),
            Ok(_) => match self.advance(SessionPhase::ScenarioRunning) {
                Err(e) => ScenarioStatus::Aborted(e),
                Ok(()) => self.execute(scenario).await,
            },
        };

        let (status, teardown_rows, teardown_error) = match self.teardown_fixture().await {
            Ok(rows) => (status, Some(rows), None),
            Err(e) => {
                log_error("session", "teardown", &e.to_string(), Some(scenario.name()));
                let status = if status.is_passed() {
                    ScenarioStatus::Failed(e.clone())
                } else {
                    status
                };
                (status, None, Some(e))
            }
        };

        let duration = started.elapsed();
        let details = status.error().map(ToString::to_string).or_else(|| match &status {
            ScenarioStatus::Panicked(msg) => Some(msg.clone()),
            _ => None,
        });
        log_scenario_outcome(
            scenario.name(),
            &status.to_string(),
            duration.as_millis() as u64,
            details.as_deref(),
        );

        ScenarioReport {
            name: scenario.name().to_string(),
            status,
            duration,
            teardown_rows,
            teardown_error,
        }
    }

    async fn execute(&self, scenario: &Scenario) -> ScenarioStatus {
        let ctx = match self.context() {
            Ok(ctx) => ctx,
            Err(e) => return ScenarioStatus::Failed(e),
        };

        match AssertUnwindSafe(scenario.run(ctx)).catch_unwind().await {
            Ok(Ok(())) => ScenarioStatus::Passed,
            Ok(Err(e)) => ScenarioStatus::Failed(e),
            Err(panic) => ScenarioStatus::Panicked(panic_message(panic)),
        }
    }

    /// Run scenarios in order; a session-fatal error skips the rest
    pub async fn run_suite(&mut self, scenarios: &[Scenario]) -> SuiteReport {
        let mut report = SuiteReport::new(self.id);

        for scenario in scenarios {
            if report.fatal.is_some() {
                report.scenarios.push(ScenarioReport::skipped(scenario.name()));
                continue;
            }

            let outcome = self.run_scenario(scenario).await;
            if let Some(fatal) = outcome.fatal_error() {
                warn!(
                    session_id = %self.id,
                    scenario = %scenario.name(),
                    error = %fatal,
                    "Session-fatal error; skipping remaining scenarios"
                );
                report.fatal = Some(fatal.clone());
            }
            report.scenarios.push(outcome);
        }

        info!(session_id = %self.id, "{}", report.summary());
        report
    }

    /// SUITE_END: close the binding, then stop the database
    pub async fn finish(mut self) -> HarnessResult<()> {
        self.advance(SessionPhase::SuiteEnded)?;

        let unbound = match self.binding.take() {
            Some(binding) => binding.close().await,
            None => Ok(()),
        };
        if let Err(e) = &unbound {
            log_error("session", "close binding", &e.to_string(), Some(&self.id.to_string()));
        }

        let stopped = self.provisioner.stop().await;
        if let Err(e) = &stopped {
            log_error("session", "stop provisioner", &e.to_string(), Some(&self.id.to_string()));
        }

        info!(session_id = %self.id, "🏁 Test session finished");
        unbound.and(stopped)
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        if !self.phase.is_terminal() {
            warn!(
                session_id = %self.id,
                phase = %self.phase,
                "Test session dropped without finish(); resources are released on drop"
            );
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "scenario panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static message")), "static message");
        assert_eq!(panic_message(Box::new(String::from("owned message"))), "owned message");
        assert_eq!(panic_message(Box::new(42_u8)), "scenario panicked");
    }

    #[tokio::test]
    async fn test_start_fails_fast_on_invalid_config() {
        let mut config = HarnessConfig::default();
        config.persistence.pool_size = 0;
        let err = tokio_test::assert_err!(TestSession::start(&config).await);
        assert!(matches!(err, HarnessError::Configuration(_)));
    }
}
