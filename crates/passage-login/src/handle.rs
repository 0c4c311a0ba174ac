//! Shared result handle of a login flow

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use passage_session::Session;

use crate::error::LoginError;
use crate::Result;

/// Awaitable outcome of one login flow.
///
/// Clones observe the same outcome. Duplicate initiations receive a clone of
/// the handle already in flight.
#[derive(Clone)]
pub struct LoginHandle {
    state: String,
    outcome: Shared<BoxFuture<'static, Result<Session>>>,
}

impl LoginHandle {
    pub(crate) fn channel(state: impl Into<String>) -> (oneshot::Sender<Result<Session>>, Self) {
        let (tx, rx) = oneshot::channel();

        let outcome = async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(LoginError::Abandoned),
            }
        }
        .boxed()
        .shared();

        let handle = Self {
            state: state.into(),
            outcome,
        };

        (tx, handle)
    }

    /// State token the flow was registered under
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Whether both handles belong to the same flow
    pub fn same_flow(&self, other: &LoginHandle) -> bool {
        Shared::ptr_eq(&self.outcome, &other.outcome)
    }

    /// Resolves once the flow is verified and persisted, or fails
    pub async fn wait(&self) -> Result<Session> {
        self.outcome.clone().await
    }

    /// Outcome if the flow has already resolved
    pub fn peek(&self) -> Option<Result<Session>> {
        self.outcome.peek().cloned()
    }
}

impl std::fmt::Debug for LoginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginHandle")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
