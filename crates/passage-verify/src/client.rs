//! HTTP client for the identity provider's API

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use url::Url;

use passage_session::aliases::is_truthy;
use passage_session::{Account, Login};

use crate::error::VerifyError;
use crate::response::{interpret_accounts, interpret_grant};
use crate::{AccountVerifier, Result};

pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_TOKEN_PATH: &str = "/api/oauth3/access_token";

#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    /// Provider base URI, without a trailing slash
    base: String,
    api_prefix: String,
    token_path: String,
}

impl ProviderClient {
    pub fn new(provider_uri: &Url) -> Self {
        Self::with_client(reqwest::Client::new(), provider_uri)
    }

    pub fn with_client(http: reqwest::Client, provider_uri: &Url) -> Self {
        Self {
            http,
            base: provider_uri.as_str().trim_end_matches('/').to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
        }
    }

    pub fn with_api_prefix(mut self, api_prefix: impl Into<String>) -> Self {
        self.api_prefix = api_prefix.into();
        self
    }

    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = token_path.into();
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base, path))?)
    }

    /// Fetch the accounts reachable with `token`
    pub async fn fetch_accounts(&self, token: &str) -> Result<Vec<Account>> {
        let url = self.endpoint(&format!("{}/accounts", self.api_prefix))?;

        tracing::debug!(url = %url, "Fetching accounts");

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?
            .error_for_status()?;

        let body = read_body(response).await?;
        interpret_accounts(body)
    }

    /// Succeeds only when the provider knows `username`.
    ///
    /// `login_type` selects the provider's identifier namespace; without one
    /// the path segment is `null`.
    pub async fn check_username(&self, login_type: Option<&str>, username: &str) -> Result<()> {
        let mut url = self.endpoint("/api/logins/check")?;
        url.path_segments_mut()
            .map_err(|_| VerifyError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(login_type.unwrap_or("null"))
            .push(username);

        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = read_body(response).await?;

        if !body.get("exists").is_some_and(is_truthy) {
            return Err(VerifyError::UsernameNotFound);
        }

        Ok(())
    }

    /// Resource-owner password grant.
    ///
    /// Error bodies are interpreted rather than rejected by status, since
    /// providers answer grant failures with a structured error and a 4xx.
    pub async fn password_grant(
        &self,
        username: &str,
        secret: &str,
        scope: Option<&str>,
        client_id: &str,
    ) -> Result<Login> {
        let mut url = self.endpoint(&self.token_path)?;
        url.query_pairs_mut().append_pair("camel", "true");

        let mut form = vec![
            ("grant_type", "password"),
            ("username", username),
            ("password", secret),
            ("client_id", client_id),
        ];
        if let Some(scope) = scope {
            form.push(("scope", scope));
        }

        let response = self.http.post(url).form(&form).send().await?;
        let body = read_body(response).await?;

        interpret_grant(body, username, passage_session::now())
    }
}

#[async_trait]
impl AccountVerifier for ProviderClient {
    async fn verify(&self, token: &str) -> Result<Vec<Account>> {
        self.fetch_accounts(token).await
    }
}

/// Parse the body as JSON; anything else is kept as a JSON string
async fn read_body(response: reqwest::Response) -> Result<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
