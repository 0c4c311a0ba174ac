//! Session data structure

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::login::Login;

/// The unified client-side view of every active login and every account
/// reachable through them.
///
/// `logins` and `accounts` are kept in `addedAt` descending order. `id`
/// mirrors `account_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub logins: Vec<Login>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The currently selected account, if any
    pub fn account(&self) -> Option<&Account> {
        let id = self.account_id.as_deref()?;
        self.find_account(id)
    }

    pub fn find_account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.has_id(id))
    }

    /// Whether any login's account snapshot contains `account_id`
    pub fn is_reachable(&self, account_id: &str) -> bool {
        self.logins.iter().any(|login| login.reaches(account_id))
    }

    pub(crate) fn clear_selection(&mut self) {
        self.account_id = None;
        self.id = None;
        self.token = None;
    }
}
