//! Login Flow Coordinator
//!
//! A flow moves INIT → PENDING → RESOLVED → CLOSED:
//! - `begin` registers the flow under its state token and presents the UI
//! - `complete` claims the flow, verifies the token and saves the session
//! - Resolution closes the UI, frees the dedup slot, then wakes every waiter
//!
//! The flow table lock is never held across an `.await` or a surface call.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

use passage_session::{Login, Session, SessionStore};
use passage_verify::AccountVerifier;

use crate::error::{CorrelationFailure, LoginError};
use crate::handle::LoginHandle;
use crate::request::{CompletionParams, LoginMode, LoginRequest};
use crate::surface::{LoginSurface, SurfaceHandle};
use crate::Result;

/// At most one flow per provider and mode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    provider_uri: String,
    mode: LoginMode,
}

struct PendingLogin {
    state: String,
    key: DedupKey,
    sender: oneshot::Sender<Result<Session>>,
    surface: Option<Box<dyn SurfaceHandle>>,
}

#[derive(Default)]
struct FlowTable {
    /// Registered flows by state token, until a completion claims them
    pending: HashMap<String, PendingLogin>,
    /// Unresolved flows by dedup key, including claimed ones
    slots: HashMap<DedupKey, LoginHandle>,
}

pub struct LoginCoordinator {
    flows: Arc<Mutex<FlowTable>>,
    surface: Arc<dyn LoginSurface>,
    verifier: Arc<dyn AccountVerifier>,
    store: SessionStore,
}

impl LoginCoordinator {
    pub fn new(
        store: SessionStore,
        verifier: Arc<dyn AccountVerifier>,
        surface: Arc<dyn LoginSurface>,
    ) -> Self {
        Self {
            flows: Arc::new(Mutex::new(FlowTable::default())),
            surface,
            verifier,
            store,
        }
    }

    /// Start a flow, or join the one already running for this provider and mode
    pub fn begin(&self, request: LoginRequest) -> Result<LoginHandle> {
        if request.state.is_empty() {
            return Err(LoginError::EmptyState);
        }

        let key = DedupKey {
            provider_uri: request.provider_uri.to_string(),
            mode: request.mode(),
        };

        let handle = {
            let mut flows = self.flows.lock();

            if let Some(existing) = flows.slots.get(&key) {
                tracing::debug!(
                    provider = %key.provider_uri,
                    mode = ?key.mode,
                    state = %existing.state(),
                    "Joining login already in progress"
                );
                return Ok(existing.clone());
            }

            if flows.pending.contains_key(&request.state) {
                return Err(LoginError::StateInUse(request.state));
            }

            let (sender, handle) = LoginHandle::channel(request.state.clone());
            flows.pending.insert(
                request.state.clone(),
                PendingLogin {
                    state: request.state.clone(),
                    key: key.clone(),
                    sender,
                    surface: None,
                },
            );
            flows.slots.insert(key, handle.clone());
            handle
        };

        tracing::info!(
            state = %request.state,
            provider = %request.provider_uri,
            presentation = ?request.presentation,
            "Started login"
        );

        match self.surface.open(request.presentation, &request.url) {
            Ok(Some(surface)) => {
                let unattached = {
                    let mut flows = self.flows.lock();
                    match flows.pending.get_mut(&request.state) {
                        Some(pending) => {
                            pending.surface = Some(surface);
                            None
                        }
                        None => Some(surface),
                    }
                };

                // Resolved while the surface was opening
                if let Some(mut surface) = unattached {
                    surface.close();
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(state = %request.state, error = %err, "Could not open login surface");
                let pending = self.flows.lock().pending.remove(&request.state);
                if let Some(pending) = pending {
                    self.resolve(pending, Err(err.clone()));
                }
                return Err(err);
            }
        }

        Ok(handle)
    }

    /// Deliver the provider's completion parameters.
    ///
    /// Correlation failures touch no flow and no session. Every other failure
    /// rejects the matched flow and is returned here as well.
    pub async fn complete(&self, params: CompletionParams) -> Result<Session> {
        let state = params
            .state()
            .ok_or(LoginError::Correlation(CorrelationFailure::MissingState))?;

        let Some(pending) = self.flows.lock().pending.remove(&state) else {
            tracing::warn!(state = %state, "Completion for unknown state, possible replay");
            return Err(CorrelationFailure::UnknownState(state).into());
        };
        let claimed = ClaimedLogin {
            coordinator: self,
            pending: Some(pending),
        };

        let outcome = self.finish(&params).await;
        match &outcome {
            Ok(session) => tracing::info!(
                state = %state,
                account_id = ?session.account_id,
                "Login completed"
            ),
            Err(err) => tracing::warn!(state = %state, error = %err, "Login failed"),
        }

        claimed.resolve(outcome.clone());
        outcome
    }

    async fn finish(&self, params: &CompletionParams) -> Result<Session> {
        let login = Login::from_token_params(params.as_map(), None, passage_session::now())
            .ok_or(LoginError::TokenMissing)?;

        let verified = self.verifier.verify_login(login).await?;
        Ok(self.store.save(verified.login, verified.accounts)?)
    }

    /// Reject a pending flow with [`LoginError::Cancelled`]
    pub fn cancel(&self, state: &str) -> Result<()> {
        let pending = self
            .flows
            .lock()
            .pending
            .remove(state)
            .ok_or_else(|| CorrelationFailure::UnknownState(state.to_string()))?;

        tracing::info!(state = %state, "Cancelled login");

        self.resolve(pending, Err(LoginError::Cancelled));
        Ok(())
    }

    /// Unresolved flows, including ones being verified
    pub fn pending_count(&self) -> usize {
        self.flows.lock().slots.len()
    }

    pub fn is_pending(&self, provider_uri: &Url, mode: LoginMode) -> bool {
        let key = DedupKey {
            provider_uri: provider_uri.to_string(),
            mode,
        };
        self.flows.lock().slots.contains_key(&key)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn resolve(&self, pending: PendingLogin, outcome: Result<Session>) {
        let PendingLogin {
            state,
            key,
            sender,
            surface,
        } = pending;

        if let Some(mut surface) = surface {
            surface.close();
        }

        {
            let mut flows = self.flows.lock();
            // A later flow may already hold the slot
            if flows.slots.get(&key).is_some_and(|slot| slot.state() == state) {
                flows.slots.remove(&key);
            }
        }

        // Waiters may have gone away
        let _ = sender.send(outcome);
    }
}

/// A flow taken out of the table by `complete`.
///
/// Dropped unresolved, as when the caller gives up on the completion while
/// the token is being verified, it rejects the flow with
/// [`LoginError::Abandoned`].
struct ClaimedLogin<'a> {
    coordinator: &'a LoginCoordinator,
    pending: Option<PendingLogin>,
}

impl ClaimedLogin<'_> {
    fn resolve(mut self, outcome: Result<Session>) {
        if let Some(pending) = self.pending.take() {
            self.coordinator.resolve(pending, outcome);
        }
    }
}

impl Drop for ClaimedLogin<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::warn!(state = %pending.state, "Completion dropped before resolving");
            self.coordinator.resolve(pending, Err(LoginError::Abandoned));
        }
    }
}

impl Clone for LoginCoordinator {
    fn clone(&self) -> Self {
        Self {
            flows: Arc::clone(&self.flows),
            surface: Arc::clone(&self.surface),
            verifier: Arc::clone(&self.verifier),
            store: self.store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Presentation;
    use async_trait::async_trait;
    use passage_session::Account;
    use passage_storage::{MemoryStorage, SnapshotStorage};
    use passage_verify::VerifyError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every token with the same account list, or a provider error
    struct FixedVerifier {
        accounts: std::result::Result<Vec<&'static str>, &'static str>,
        calls: AtomicUsize,
    }

    impl FixedVerifier {
        fn accounts(ids: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                accounts: Ok(ids),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                accounts: Err(message),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AccountVerifier for FixedVerifier {
        async fn verify(&self, _token: &str) -> passage_verify::Result<Vec<Account>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.accounts {
                Ok(ids) => Ok(ids.iter().map(|id| Account::with_id(*id)).collect()),
                Err(message) => Err(VerifyError::Provider(message.to_string())),
            }
        }
    }

    /// Never finishes verifying within a test
    struct StalledVerifier;

    #[async_trait]
    impl AccountVerifier for StalledVerifier {
        async fn verify(&self, _token: &str) -> passage_verify::Result<Vec<Account>> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
        fail: bool,
    }

    struct RecordedHandle(Arc<AtomicUsize>);

    impl SurfaceHandle for RecordedHandle {
        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl LoginSurface for RecordingSurface {
        fn open(
            &self,
            presentation: Presentation,
            _url: &Url,
        ) -> Result<Option<Box<dyn SurfaceHandle>>> {
            if self.fail {
                return Err(LoginError::Surface("popup blocked".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            match presentation {
                Presentation::Redirect => Ok(None),
                _ => Ok(Some(Box::new(RecordedHandle(Arc::clone(&self.closed))))),
            }
        }
    }

    fn provider() -> Url {
        Url::parse("https://provider.example").unwrap()
    }

    fn request(state: &str, presentation: Presentation) -> LoginRequest {
        let url = Url::parse("https://provider.example/authorize").unwrap();
        LoginRequest::new(provider(), url, state, presentation)
    }

    fn params(value: serde_json::Value) -> CompletionParams {
        CompletionParams::new(value.as_object().cloned().unwrap())
    }

    fn coordinator(
        verifier: Arc<FixedVerifier>,
        surface: Arc<RecordingSurface>,
    ) -> (LoginCoordinator, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(Arc::new(storage.clone()));
        (LoginCoordinator::new(store, verifier, surface), storage)
    }

    #[tokio::test]
    async fn test_duplicate_begin_shares_handle() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface.clone());

        let first = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let second = coordinator.begin(request("s2", Presentation::Popup)).unwrap();

        assert!(first.same_flow(&second));
        assert_eq!(second.state(), "s1");
        assert_eq!(surface.opened.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_count(), 1);

        // The joining request minted nothing
        let err = coordinator
            .complete(params(json!({"state": "s2", "access_token": "t1"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoginError::Correlation(CorrelationFailure::UnknownState(ref s)) if s == "s2"
        ));

        coordinator
            .complete(params(json!({"state": "s1", "access_token": "t1"})))
            .await
            .unwrap();
        assert!(first.wait().await.is_ok());
        assert!(second.wait().await.is_ok());

        let third = coordinator.begin(request("s3", Presentation::Popup)).unwrap();
        assert!(!third.same_flow(&first));
        assert_eq!(surface.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_modes_do_not_share_slots() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface);

        let foreground = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let background = coordinator.begin(request("s2", Presentation::Frame)).unwrap();

        assert!(!foreground.same_flow(&background));
        assert!(coordinator.is_pending(&provider(), LoginMode::Foreground));
        assert!(coordinator.is_pending(&provider(), LoginMode::Background));
        assert_eq!(coordinator.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_completion_saves_session() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, storage) =
            coordinator(FixedVerifier::accounts(vec!["a"]), surface.clone());

        let handle = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let session = coordinator
            .complete(CompletionParams::from_query(
                "#access_token=t1&expires_at=4102444800000&browser_state=s1",
            ))
            .await
            .unwrap();

        assert_eq!(session.account_id.as_deref(), Some("a"));
        assert_eq!(session.token.as_deref(), Some("t1"));
        assert_eq!(session.logins[0].selected_account_id.as_deref(), Some("a"));

        assert_eq!(handle.wait().await.unwrap(), session);
        assert_eq!(surface.closed.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_count(), 0);
        assert!(!coordinator.is_pending(&provider(), LoginMode::Foreground));

        assert!(storage
            .load(passage_session::DEFAULT_SESSION_KEY)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_missing_state_touches_nothing() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface.clone());

        let handle = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let err = coordinator
            .complete(params(json!({"access_token": "t1"})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LoginError::Correlation(CorrelationFailure::MissingState)
        ));
        assert!(handle.peek().is_none());
        assert_eq!(coordinator.pending_count(), 1);
        assert_eq!(surface.closed.load(Ordering::SeqCst), 0);
        assert!(!coordinator.store().current().is_authenticated());
    }

    #[tokio::test]
    async fn test_token_missing_rejects_flow() {
        let surface = Arc::new(RecordingSurface::default());
        let verifier = FixedVerifier::accounts(vec!["a"]);
        let (coordinator, _) = coordinator(verifier.clone(), surface.clone());

        let handle = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let err = coordinator
            .complete(params(json!({"state": "s1"})))
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::TokenMissing));
        assert!(matches!(handle.wait().await, Err(LoginError::TokenMissing)));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(surface.closed.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_verifier_error_leaves_session_unchanged() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::failing("bad creds"), surface);

        let handle = coordinator.begin(request("s1", Presentation::Frame)).unwrap();
        coordinator
            .complete(params(json!({"state": "s1", "token": "t1"})))
            .await
            .unwrap_err();

        match handle.wait().await {
            Err(LoginError::Verify(err)) => {
                assert_eq!(err.provider_message(), Some("bad creds"))
            }
            other => panic!("expected provider error, got {:?}", other),
        }
        assert_eq!(coordinator.store().current(), Session::new());
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_replayed_completion_is_unknown() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface);

        coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let completion = params(json!({"state": "s1", "access_token": "t1"}));
        coordinator.complete(completion.clone()).await.unwrap();

        let err = coordinator.complete(completion).await.unwrap_err();
        assert!(matches!(
            err,
            LoginError::Correlation(CorrelationFailure::UnknownState(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface.clone());

        let handle = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        coordinator.cancel("s1").unwrap();

        assert!(matches!(handle.wait().await, Err(LoginError::Cancelled)));
        assert_eq!(surface.closed.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_count(), 0);

        assert!(matches!(
            coordinator.cancel("s1"),
            Err(LoginError::Correlation(CorrelationFailure::UnknownState(_)))
        ));
    }

    #[tokio::test]
    async fn test_begin_developer_errors() {
        let surface = Arc::new(RecordingSurface::default());
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface.clone());

        let err = coordinator.begin(request("", Presentation::Popup)).unwrap_err();
        assert!(matches!(err, LoginError::EmptyState));
        assert!(err.is_developer_error());

        coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let err = coordinator.begin(request("s1", Presentation::Frame)).unwrap_err();
        assert!(matches!(err, LoginError::StateInUse(_)));
        assert_eq!(surface.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_surface_failure_frees_slot() {
        let surface = Arc::new(RecordingSurface {
            fail: true,
            ..Default::default()
        });
        let (coordinator, _) = coordinator(FixedVerifier::accounts(vec!["a"]), surface);

        let err = coordinator.begin(request("s1", Presentation::Popup)).unwrap_err();
        assert!(matches!(err, LoginError::Surface(_)));
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_completion_frees_slot() {
        let surface = Arc::new(RecordingSurface::default());
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let coordinator = LoginCoordinator::new(store, Arc::new(StalledVerifier), surface.clone());

        let first = coordinator.begin(request("s1", Presentation::Popup)).unwrap();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            coordinator.complete(params(json!({"state": "s1", "access_token": "t1"}))),
        )
        .await;
        assert!(timed_out.is_err());

        assert_eq!(coordinator.pending_count(), 0);
        assert!(!coordinator.is_pending(&provider(), LoginMode::Foreground));
        assert!(matches!(first.wait().await, Err(LoginError::Abandoned)));
        assert_eq!(surface.closed.load(Ordering::SeqCst), 1);
        assert!(!coordinator.store().current().is_authenticated());

        let second = coordinator.begin(request("s2", Presentation::Popup)).unwrap();
        assert!(!second.same_flow(&first));
        assert_eq!(second.state(), "s2");
        assert!(second.peek().is_none());
    }
}
