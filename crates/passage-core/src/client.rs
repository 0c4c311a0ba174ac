//! Client facade
//!
//! One `Client` per provider. It owns the session store and the login
//! coordinator, and exposes the session lifecycle to the application.

use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

use passage_login::{
    AuthorizationRequest, CompletionParams, LoginCoordinator, LoginHandle, LoginSurface,
    Presentation,
};
use passage_session::{Account, Session, SessionError, SessionEvent, SessionStore};
use passage_storage::{Database, SnapshotStorage};
use passage_verify::{AccountVerifier, ProviderClient};

use crate::config::Config;
use crate::Result;

/// How an implicit grant is presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitGrantOptions {
    pub presentation: Presentation,
    pub scope: Option<String>,
    /// Overrides the configured redirect URI
    pub redirect_uri: Option<Url>,
    /// Skip re-verifying the stored session and always start a new grant
    pub force: bool,
}

impl Default for ImplicitGrantOptions {
    fn default() -> Self {
        Self {
            presentation: Presentation::Popup,
            scope: None,
            redirect_uri: None,
            force: false,
        }
    }
}

pub struct Client {
    /// Configuration
    config: Config,
    provider_uri: Url,
    /// Shared session
    store: SessionStore,
    /// Provider HTTP API
    provider: ProviderClient,
    verifier: Arc<dyn AccountVerifier>,
    surface: Arc<dyn LoginSurface>,
    coordinator: LoginCoordinator,
}

impl Client {
    /// Open a client backed by the configured database
    pub fn open(config: Config, surface: Arc<dyn LoginSurface>) -> Result<Self> {
        config.validate()?;

        // Ensure data directory exists
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        Self::with_storage(config, Arc::new(db), surface)
    }

    /// Client over any snapshot storage, verifying against the provider's API
    pub fn with_storage(
        config: Config,
        storage: Arc<dyn SnapshotStorage>,
        surface: Arc<dyn LoginSurface>,
    ) -> Result<Self> {
        let provider_uri = config.validate()?;
        let provider = provider_client(&config, &provider_uri);
        Self::from_parts(config, storage, Arc::new(provider), surface)
    }

    pub fn from_parts(
        config: Config,
        storage: Arc<dyn SnapshotStorage>,
        verifier: Arc<dyn AccountVerifier>,
        surface: Arc<dyn LoginSurface>,
    ) -> Result<Self> {
        let provider_uri = config.validate()?;
        let provider = provider_client(&config, &provider_uri);

        let store = SessionStore::with_key(storage, config.session_key.clone());
        let coordinator =
            LoginCoordinator::new(store.clone(), Arc::clone(&verifier), Arc::clone(&surface));

        tracing::info!(provider = %provider_uri, "Client initialized");

        Ok(Self {
            config,
            provider_uri,
            store,
            provider,
            verifier,
            surface,
            coordinator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn coordinator(&self) -> &LoginCoordinator {
        &self.coordinator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    // === Session ===

    pub fn restore(&self) -> Result<Session> {
        Ok(self.store.restore()?)
    }

    pub fn check_session(&self) -> Result<Session> {
        self.restore()
    }

    /// Restored session, or the outcome of a new popup login
    pub async fn require_session(&self) -> Result<Session> {
        match self.store.restore() {
            Ok(session) => Ok(session),
            Err(SessionError::NoSession) => {
                let handle = self.implicit_grant(ImplicitGrantOptions::default())?;
                Ok(handle.wait().await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Reuse a session with a selected account unless `force` is set
    pub async fn login(&self, scope: Option<&str>, force: bool) -> Result<Session> {
        if !force {
            match self.store.restore() {
                Ok(session) if session.account_id.is_some() => return Ok(session),
                Ok(_) | Err(SessionError::NoSession) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let handle = self.implicit_grant(ImplicitGrantOptions {
            scope: scope.map(str::to_string),
            ..Default::default()
        })?;
        Ok(handle.wait().await?)
    }

    pub fn current_account(&self) -> Option<Account> {
        self.store.current_account()
    }

    pub fn select_account(&self, account_id: &str) -> Result<Session> {
        Ok(self.store.select_account(account_id)?)
    }

    pub fn destroy(&self) -> Result<Session> {
        Ok(self.store.destroy()?)
    }

    // === Login flows ===

    /// Start an implicit grant, or join the one already in flight
    pub fn implicit_grant(&self, options: ImplicitGrantOptions) -> Result<LoginHandle> {
        let redirect_uri = match options.redirect_uri {
            Some(uri) => uri,
            None => self.config.redirect_uri()?,
        };

        let request = AuthorizationRequest::implicit_grant(
            &self.config.authorization_endpoint()?,
            self.config.client_id(),
            &redirect_uri,
            options.scope.as_deref(),
        )
        .into_login(self.provider_uri.clone(), options.presentation);

        Ok(self.coordinator.begin(request)?)
    }

    /// Re-verify every stored login, or start a new grant when forced or
    /// when nothing is stored
    pub async fn implicit_grant_login(&self, options: ImplicitGrantOptions) -> Result<Session> {
        if !options.force {
            match self.store.restore() {
                Ok(session) => return self.reverify(session).await,
                Err(SessionError::NoSession) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let handle = self.implicit_grant(options)?;
        Ok(handle.wait().await?)
    }

    /// Silent login in a hidden frame
    pub async fn background_login(&self, scope: Option<&str>) -> Result<Session> {
        self.implicit_grant_login(ImplicitGrantOptions {
            presentation: Presentation::Frame,
            scope: scope.map(str::to_string),
            ..Default::default()
        })
        .await
    }

    async fn reverify(&self, mut session: Session) -> Result<Session> {
        for login in session.logins.clone() {
            let verified = self.verifier.verify_login(login).await?;
            session = self.store.save(verified.login, verified.accounts)?;
        }

        Ok(session)
    }

    pub async fn complete_login(&self, params: CompletionParams) -> Result<Session> {
        Ok(self.coordinator.complete(params).await?)
    }

    pub fn cancel_login(&self, state: &str) -> Result<()> {
        Ok(self.coordinator.cancel(state)?)
    }

    // === Credentials ===

    pub async fn password_login(
        &self,
        username: &str,
        secret: &str,
        scope: Option<&str>,
    ) -> Result<Session> {
        let login = self
            .provider
            .password_grant(username, secret, scope, self.config.client_id())
            .await?;

        let verified = self.verifier.verify_login(login).await?;
        let session = self.store.save(verified.login, verified.accounts)?;

        tracing::info!(username = %username, account_id = ?session.account_id, "Password login");

        Ok(session)
    }

    pub async fn check_username(&self, username: &str) -> Result<()> {
        Ok(self.provider.check_username(None, username).await?)
    }

    pub fn validate_username(&self, username: &str) -> Result<()> {
        Ok(passage_verify::validate_username(username)?)
    }

    pub fn validate_secret(&self, secret: &str) -> Result<()> {
        Ok(passage_verify::validate_secret(secret)?)
    }

    /// End the provider's session in a hidden frame, wait out the grace
    /// period, then destroy the local session
    pub async fn logout(&self) -> Result<Session> {
        let url = self.config.logout_url()?;

        let frame = match self.surface.open(Presentation::Frame, &url) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "Could not open logout frame");
                None
            }
        };

        tokio::time::sleep(self.config.logout_grace).await;

        if let Some(mut frame) = frame {
            frame.close();
        }

        self.destroy()
    }
}

fn provider_client(config: &Config, provider_uri: &Url) -> ProviderClient {
    ProviderClient::new(provider_uri)
        .with_api_prefix(config.api_prefix.clone())
        .with_token_path(config.token_path.clone())
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            provider_uri: self.provider_uri.clone(),
            store: self.store.clone(),
            provider: self.provider.clone(),
            verifier: Arc::clone(&self.verifier),
            surface: Arc::clone(&self.surface),
            coordinator: self.coordinator.clone(),
        }
    }
}
