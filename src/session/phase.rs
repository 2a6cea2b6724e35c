use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HarnessError, HarnessResult};

/// Lifecycle of a test session:
/// `SuiteStart → (FixtureSeed → Scenario → FixtureTeardown)* → SuiteEnd`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Database provisioned and binding open, no scenario run yet
    SuiteStarted,
    /// Table reset and baseline fixture committed
    FixtureSeeded,
    /// A scenario body is executing
    ScenarioRunning,
    /// Table cleared after a scenario
    FixtureTornDown,
    /// Binding closed and database stopped
    SuiteEnded,
}

impl SessionPhase {
    /// Check if this is a terminal phase (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SuiteEnded)
    }

    /// Whether a new fixture may be seeded from here
    pub fn can_seed(&self) -> bool {
        matches!(self, Self::SuiteStarted | Self::FixtureTornDown)
    }

    /// Validate a transition against the lifecycle table
    pub fn transition(self, next: SessionPhase) -> HarnessResult<SessionPhase> {
        use SessionPhase::*;

        let allowed = match (self, next) {
            (SuiteStarted | FixtureTornDown, FixtureSeeded) => true,
            (FixtureSeeded, ScenarioRunning) => true,
            // Teardown also runs after a failed seed, before any scenario started
            (SuiteStarted | FixtureSeeded | ScenarioRunning | FixtureTornDown, FixtureTornDown) => {
                true
            }
            (current, SuiteEnded) => !current.is_terminal(),
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(HarnessError::Session(format!(
                "illegal session transition {self} -> {next}"
            )))
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuiteStarted => write!(f, "suite_started"),
            Self::FixtureSeeded => write!(f, "fixture_seeded"),
            Self::ScenarioRunning => write!(f, "scenario_running"),
            Self::FixtureTornDown => write!(f, "fixture_torn_down"),
            Self::SuiteEnded => write!(f, "suite_ended"),
        }
    }
}
