//! Login flow error types

use std::sync::Arc;
use thiserror::Error;

use passage_session::SessionError;
use passage_verify::VerifyError;

/// Why a completion could not be matched to a pending flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationFailure {
    MissingState,
    UnknownState(String),
}

impl std::fmt::Display for CorrelationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationFailure::MissingState => write!(f, "could not parse state from login"),
            CorrelationFailure::UnknownState(state) => {
                write!(f, "didn't get matching state: {}", state)
            }
        }
    }
}

/// Login flow errors.
///
/// Every waiter on a flow observes the same outcome, so collaborator errors
/// are held behind an `Arc` to keep this type cheap to clone.
#[derive(Error, Debug, Clone)]
pub enum LoginError {
    #[error("Correlation error: {0}")]
    Correlation(CorrelationFailure),

    #[error("didn't get token")]
    TokenMissing,

    #[error("[Developer Error] login request state is empty")]
    EmptyState,

    #[error("[Developer Error] state {0} is already registered")]
    StateInUse(String),

    #[error("Login cancelled")]
    Cancelled,

    /// The coordinator dropped the flow without resolving it
    #[error("Login abandoned")]
    Abandoned,

    #[error("Could not present login: {0}")]
    Surface(String),

    #[error(transparent)]
    Verify(Arc<VerifyError>),

    #[error(transparent)]
    Session(Arc<SessionError>),
}

impl LoginError {
    /// Caller-contract violations, as opposed to runtime conditions
    pub fn is_developer_error(&self) -> bool {
        match self {
            LoginError::EmptyState | LoginError::StateInUse(_) => true,
            LoginError::Session(err) => err.is_developer_error(),
            _ => false,
        }
    }
}

impl From<VerifyError> for LoginError {
    fn from(err: VerifyError) -> Self {
        LoginError::Verify(Arc::new(err))
    }
}

impl From<SessionError> for LoginError {
    fn from(err: SessionError) -> Self {
        LoginError::Session(Arc::new(err))
    }
}

impl From<CorrelationFailure> for LoginError {
    fn from(failure: CorrelationFailure) -> Self {
        LoginError::Correlation(failure)
    }
}
