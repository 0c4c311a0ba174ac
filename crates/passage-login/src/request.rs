//! Login requests and completion parameters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use passage_session::aliases;

/// How the provider's login UI is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    /// Navigate the current view to the provider
    Redirect,
    Popup,
    /// Hidden frame; succeeds only if the provider can log in without interaction
    Frame,
}

impl Presentation {
    pub fn mode(&self) -> LoginMode {
        match self {
            Presentation::Redirect | Presentation::Popup => LoginMode::Foreground,
            Presentation::Frame => LoginMode::Background,
        }
    }
}

/// Whether the user sees the flow; part of the dedup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
    Foreground,
    Background,
}

/// A login flow ready to be presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub provider_uri: Url,
    /// Where the login UI is loaded from
    pub url: Url,
    pub state: String,
    pub presentation: Presentation,
}

impl LoginRequest {
    pub fn new(
        provider_uri: Url,
        url: Url,
        state: impl Into<String>,
        presentation: Presentation,
    ) -> Self {
        Self {
            provider_uri,
            url,
            state: state.into(),
            presentation,
        }
    }

    pub fn mode(&self) -> LoginMode {
        self.presentation.mode()
    }
}

/// An OAuth authorization dialog URL and the state token minted for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

impl AuthorizationRequest {
    /// Implicit grant (`response_type=token`) against `authorization_endpoint`
    pub fn implicit_grant(
        authorization_endpoint: &Url,
        client_id: &str,
        redirect_uri: &Url,
        scope: Option<&str>,
    ) -> Self {
        let state = Uuid::new_v4().simple().to_string();

        let mut url = authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "token")
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", redirect_uri.as_str());
            if let Some(scope) = scope {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", &state);
        }

        Self { url, state }
    }

    pub fn into_login(self, provider_uri: Url, presentation: Presentation) -> LoginRequest {
        LoginRequest::new(provider_uri, self.url, self.state, presentation)
    }
}

/// Parameters the provider hands back when a flow completes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionParams(Map<String, Value>);

impl CompletionParams {
    pub fn new(params: Map<String, Value>) -> Self {
        Self(params)
    }

    /// Parse a `key=value&...` string, with or without a leading `?` or `#`
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches(['?', '#']);
        let params = url::form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect();

        Self(params)
    }

    /// Parameters of a redirect URL; implicit grants answer in the fragment
    pub fn from_url(url: &Url) -> Self {
        match url.fragment().filter(|f| !f.is_empty()) {
            Some(fragment) => Self::from_query(fragment),
            None => Self::from_query(url.query().unwrap_or_default()),
        }
    }

    pub fn state(&self) -> Option<String> {
        aliases::first_string(&self.0, aliases::STATE)
    }

    pub fn has_token(&self) -> bool {
        aliases::first_present(&self.0, aliases::TOKEN).is_some()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for CompletionParams {
    fn from(params: Map<String, Value>) -> Self {
        Self(params)
    }
}
