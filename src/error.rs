//! Error types for the harness.
//!
//! The taxonomy separates failures that poison the whole session (the database could not be
//! provisioned, the persistence binding is misconfigured or already closed) from failures that
//! only fail the scenario in which they happen (a commit that did not go through, an assertion
//! that did not hold).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarnessError {
    #[error("Provision error: {0}")]
    Provision(String),
    #[error("Binding error: {0}")]
    Binding(String),
    #[error("Binding already closed: {0}")]
    ClosedBinding(String),
    #[error("Transaction error during {operation}: {reason}")]
    Transaction { operation: String, reason: String },
    #[error("Assertion failed ({context}): expected {expected}, got {actual}")]
    Assertion {
        context: String,
        expected: String,
        actual: String,
    },
    #[error("Entity {id} is not managed by the current unit of work")]
    DetachedEntity { id: i64 },
    #[error("Entity {id} not found")]
    EntityNotFound { id: i64 },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Session error: {0}")]
    Session(String),
}

impl HarnessError {
    pub fn transaction(operation: impl Into<String>, error: impl std::fmt::Display) -> Self {
        HarnessError::Transaction {
            operation: operation.into(),
            reason: error.to_string(),
        }
    }

    pub fn assertion(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        HarnessError::Assertion {
            context: context.into(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Whether this error must abort every remaining scenario of the session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            HarnessError::Provision(_)
                | HarnessError::Binding(_)
                | HarnessError::ClosedBinding(_)
                | HarnessError::Configuration(_)
                | HarnessError::Session(_)
        )
    }

    /// Short machine-friendly kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Provision(_) => "provision",
            HarnessError::Binding(_) => "binding",
            HarnessError::ClosedBinding(_) => "closed_binding",
            HarnessError::Transaction { .. } => "transaction",
            HarnessError::Assertion { .. } => "assertion",
            HarnessError::DetachedEntity { .. } => "detached_entity",
            HarnessError::EntityNotFound { .. } => "entity_not_found",
            HarnessError::Configuration(_) => "configuration",
            HarnessError::Session(_) => "session",
        }
    }
}

impl From<::config::ConfigError> for HarnessError {
    fn from(error: ::config::ConfigError) -> Self {
        HarnessError::Configuration(error.to_string())
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Fail with an [`HarnessError::Assertion`] unless both values are equal.
pub fn ensure_eq<T>(context: &str, expected: T, actual: T) -> HarnessResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::assertion(context, expected, actual))
    }
}
