//! Passage Session Management
//!
//! - A Session aggregates every active login and every account reachable through them
//! - All mutation goes through the reconciler in [`reconcile`]
//! - The [`SessionStore`] persists a snapshot after every successful mutation
//! - Exactly one account is selected automatically; with more, the caller chooses

pub mod aliases;
pub mod reconcile;

mod account;
mod error;
mod login;
mod session;
mod store;

pub use account::{Account, AccountRef};
pub use error::SessionError;
pub use login::{Login, DEFAULT_TOKEN_LIFETIME, USERNAME_LOGIN_TYPE};
pub use session::Session;
pub use store::{CacheInvalidator, SessionEvent, SessionStore, DEFAULT_SESSION_KEY};

pub type Result<T> = std::result::Result<T, SessionError>;

/// Current time at the millisecond precision snapshots are stored with
pub fn now() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(3)
}
