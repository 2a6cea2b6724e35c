use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{HarnessError, HarnessResult};

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioStatus {
    Passed,
    /// The scenario body, or the teardown after it, returned an error
    Failed(HarnessError),
    /// Fixture seeding failed; the body never ran
    Aborted(HarnessError),
    Panicked(String),
    /// Not run because an earlier failure was fatal to the session
    Skipped,
}

impl ScenarioStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Aborted(_) | Self::Panicked(_))
    }

    pub fn error(&self) -> Option<&HarnessError> {
        match self {
            Self::Failed(e) | Self::Aborted(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed(_) => write!(f, "failed"),
            Self::Aborted(_) => write!(f, "aborted"),
            Self::Panicked(_) => write!(f, "panicked"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub duration: Duration,
    /// Rows the teardown removed; `None` when teardown did not complete
    pub teardown_rows: Option<u64>,
    pub teardown_error: Option<HarnessError>,
}

impl ScenarioReport {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Skipped,
            duration: Duration::ZERO,
            teardown_rows: None,
            teardown_error: None,
        }
    }

    /// The error that must stop the rest of the suite, if any
    pub fn fatal_error(&self) -> Option<&HarnessError> {
        self.status
            .error()
            .filter(|e| e.is_session_fatal())
            .or_else(|| self.teardown_error.as_ref().filter(|e| e.is_session_fatal()))
    }

    fn as_error(&self) -> Option<HarnessError> {
        match &self.status {
            ScenarioStatus::Failed(e) | ScenarioStatus::Aborted(e) => Some(e.clone()),
            ScenarioStatus::Panicked(msg) => Some(HarnessError::Assertion {
                context: format!("scenario '{}'", self.name),
                expected: "no panic".to_string(),
                actual: msg.clone(),
            }),
            ScenarioStatus::Passed | ScenarioStatus::Skipped => None,
        }
    }
}

/// Per-scenario outcomes of one session
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteReport {
    pub session_id: Uuid,
    pub scenarios: Vec<ScenarioReport>,
    /// Error that aborted the remaining scenarios
    pub fatal: Option<HarnessError>,
    /// Error from closing the binding or stopping the database
    pub shutdown_error: Option<HarnessError>,
}

impl SuiteReport {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            scenarios: Vec::new(),
            fatal: None,
            shutdown_error: None,
        }
    }

    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.status.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.status.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Skipped)
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn all_passed(&self) -> bool {
        self.fatal.is_none()
            && self.shutdown_error.is_none()
            && self.scenarios.iter().all(|s| s.status.is_passed())
    }

    /// `Ok(self)` when every scenario passed, else the most significant error
    pub fn into_result(self) -> HarnessResult<Self> {
        if let Some(fatal) = &self.fatal {
            return Err(fatal.clone());
        }
        if let Some(err) = self.scenarios.iter().find_map(ScenarioReport::as_error) {
            return Err(err);
        }
        if let Some(err) = &self.shutdown_error {
            return Err(err.clone());
        }
        Ok(self)
    }

    pub fn summary(&self) -> String {
        format!(
            "session {}: {} passed, {} failed, {} skipped",
            self.session_id,
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}
