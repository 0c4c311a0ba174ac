//! Passage Core
//!
//! Client-side multi-login sessions. A [`Client`] aggregates every login
//! obtained from one identity provider and the accounts each login can
//! reach, and coordinates the interactive flows that produce them.

mod client;
mod config;
mod error;

pub use client::{Client, ImplicitGrantOptions};
pub use config::Config;
pub use error::CoreError;

// Re-export the building blocks
pub use passage_login::{
    AuthorizationRequest, CompletionParams, CorrelationFailure, HeadlessSurface, LoginCoordinator,
    LoginError, LoginHandle, LoginMode, LoginRequest, LoginSurface, Presentation, SurfaceHandle,
};
pub use passage_session::{
    Account, AccountRef, CacheInvalidator, Login, Session, SessionError, SessionEvent,
    SessionStore,
};
pub use passage_storage::{Database, MemoryStorage, SnapshotStorage, StorageError};
pub use passage_verify::{
    AccountVerifier, CredentialError, ProviderClient, Verified, VerifyError,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
