//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] passage_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] passage_session::SessionError),

    #[error("Verification error: {0}")]
    Verify(#[from] passage_verify::VerifyError),

    #[error("Login error: {0}")]
    Login(#[from] passage_login::LoginError),

    #[error("{0}")]
    Credential(#[from] passage_verify::CredentialError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[Developer Error] configuration: {0}")]
    Config(String),
}

impl CoreError {
    /// Caller-contract violations, as opposed to runtime conditions
    pub fn is_developer_error(&self) -> bool {
        match self {
            CoreError::Config(_) => true,
            CoreError::Session(err) => err.is_developer_error(),
            CoreError::Login(err) => err.is_developer_error(),
            _ => false,
        }
    }
}
