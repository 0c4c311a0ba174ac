//! Passage Account Verification
//!
//! Turns a bearer token into the accounts it can reach. The provider's HTTP
//! API is one implementation of [`AccountVerifier`]; the login coordinator
//! only depends on the trait.

mod client;
mod error;
mod response;
mod username;

pub use client::{ProviderClient, DEFAULT_API_PREFIX, DEFAULT_TOKEN_PATH};
pub use error::VerifyError;
pub use response::{interpret_accounts, interpret_grant, Verified, UNKNOWN_ACCOUNTS_ERROR};
pub use username::{
    validate_secret, validate_username, CredentialError, SECRET_MIN_LENGTH, USERNAME_MIN_LENGTH,
};

use async_trait::async_trait;
use passage_session::{Account, Login};

pub type Result<T> = std::result::Result<T, VerifyError>;

#[async_trait]
pub trait AccountVerifier: Send + Sync {
    /// Accounts reachable with `token`
    async fn verify(&self, token: &str) -> Result<Vec<Account>>;

    /// Verify `login` and pair it with its accounts
    async fn verify_login(&self, login: Login) -> Result<Verified> {
        let accounts = self.verify(&login.token).await?;
        Ok(Verified { login, accounts })
    }
}
