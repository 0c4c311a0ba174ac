//! Local username and secret checks, before anything reaches the provider

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

pub const USERNAME_MIN_LENGTH: usize = 4;
pub const SECRET_MIN_LENGTH: usize = 8;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-z.\-_]+$").expect("USERNAME_RE should compile"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Only alphanumeric characters, '-', '_', and '.' are allowed in usernames.")]
    InvalidCharacters,

    #[error("Username too short. Use at least {0} characters.")]
    UsernameTooShort(usize),

    #[error("Secret too short. Use at least {0} characters.")]
    SecretTooShort(usize),
}

pub fn validate_username(username: &str) -> Result<(), CredentialError> {
    if !USERNAME_RE.is_match(username) {
        return Err(CredentialError::InvalidCharacters);
    }

    if username.chars().count() < USERNAME_MIN_LENGTH {
        return Err(CredentialError::UsernameTooShort(USERNAME_MIN_LENGTH));
    }

    Ok(())
}

pub fn validate_secret(secret: &str) -> Result<(), CredentialError> {
    if secret.chars().count() < SECRET_MIN_LENGTH {
        return Err(CredentialError::SecretTooShort(SECRET_MIN_LENGTH));
    }

    Ok(())
}
