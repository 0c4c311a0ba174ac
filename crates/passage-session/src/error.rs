//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No Session")]
    NoSession,

    /// The caller offered an account the session has no login for
    #[error("[Developer Error] account {0} is not reachable from any login")]
    UnreachableAccount(String),

    #[error("Storage error: {0}")]
    Storage(#[from] passage_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    /// Caller-contract violations, as opposed to runtime conditions
    pub fn is_developer_error(&self) -> bool {
        matches!(self, SessionError::UnreachableAccount(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_session_message() {
        assert_eq!(SessionError::NoSession.to_string(), "No Session");
        assert!(!SessionError::NoSession.is_developer_error());
    }

    #[test]
    fn test_unreachable_account_is_developer_error() {
        let err = SessionError::UnreachableAccount("acct-9".to_string());
        assert!(err.is_developer_error());
        assert!(err.to_string().contains("acct-9"));
    }
}
