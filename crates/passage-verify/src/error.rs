//! Verification error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    /// The provider answered with a structured error; its message is kept verbatim
    #[error("Could not verify login: {0}")]
    Provider(String),

    /// The response was neither an account list nor a structured error
    #[error("Could not verify login: unexpected response {0}")]
    UnknownResponseShape(String),

    #[error("username does not exist")]
    UsernameNotFound,

    #[error("Invalid provider URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl VerifyError {
    /// Message carried by a provider error
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            VerifyError::Provider(message) => Some(message),
            _ => None,
        }
    }
}
