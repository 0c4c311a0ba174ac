//! Login records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::account::AccountRef;
use crate::aliases;

/// Lifetime assumed when the provider omits an expiry
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(1);

/// Login type tag for username/secret logins
pub const USERNAME_LOGIN_TYPE: &str = "username";

/// One authenticated credential obtained from a single provider flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub login_type: Option<String>,
    pub token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Stamped once, when the login first goes through a session update
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub app_scoped_id: Option<String>,
    /// Accounts this login could reach when it was last verified
    #[serde(default)]
    pub accounts: Vec<AccountRef>,
    #[serde(default)]
    pub selected_account_id: Option<String>,
}

impl Login {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            login_id: None,
            login_type: None,
            token: token.into(),
            expires_at,
            added_at: None,
            app_scoped_id: None,
            accounts: Vec::new(),
            selected_account_id: None,
        }
    }

    /// Build a login from provider token parameters.
    ///
    /// Returns `None` when no token alias is present. A missing expiry
    /// defaults to `now + DEFAULT_TOKEN_LIFETIME`.
    pub fn from_token_params(
        params: &Map<String, Value>,
        login_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let token = aliases::first_string(params, aliases::TOKEN)?;
        let expires_at = aliases::first_timestamp(params, aliases::EXPIRES_AT)
            .unwrap_or(now + DEFAULT_TOKEN_LIFETIME);

        let mut login = Self::new(token, expires_at);
        login.app_scoped_id = aliases::first_string(params, aliases::APP_SCOPED_ID);
        login.login_id = login_id.map(str::to_string);
        login.login_type = login_id.map(|_| USERNAME_LOGIN_TYPE.to_string());

        Some(login)
    }

    /// Same `loginId` (when this login has one) or same token
    pub fn same_identity(&self, other: &Login) -> bool {
        let same_id = self.login_id.is_some() && self.login_id == other.login_id;
        same_id || self.token == other.token
    }

    pub fn reaches(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|a| a.id == account_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
