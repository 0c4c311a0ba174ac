//! Session reconciliation
//!
//! Pure functions that merge verified login data into a [`Session`], prune
//! accounts no login can reach, and keep the current-account selection
//! consistent. The clock is passed in; nothing here performs I/O.
//!
//! After [`update_session`] the session satisfies:
//! - `accounts` is exactly the set of accounts reachable from `logins`
//! - `account_id`, when set, is reachable from some login
//! - `logins` and `accounts` are ordered by `addedAt`, newest first

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::account::{Account, AccountRef};
use crate::error::SessionError;
use crate::login::Login;
use crate::session::Session;
use crate::Result;

/// Token of the login that can reach `account_id` and expires last.
///
/// Ties go to the login that appears first in `session.logins`.
pub fn lookup_token<'a>(session: &'a Session, account_id: &str) -> Option<&'a str> {
    let mut best: Option<&Login> = None;

    for login in session.logins.iter().filter(|l| l.reaches(account_id)) {
        match best {
            Some(current) if login.expires_at <= current.expires_at => {}
            _ => best = Some(login),
        }
    }

    best.map(|login| login.token.as_str())
}

/// Merge `accounts` into the session and record them as the login's
/// reachable set.
pub fn merge_accounts(
    session: &mut Session,
    login: &mut Login,
    accounts: Vec<Account>,
    now: DateTime<Utc>,
) {
    let mut reachable: Vec<AccountRef> = Vec::with_capacity(accounts.len());

    for mut account in accounts {
        let Some(id) = account.id() else {
            continue;
        };

        if !reachable.iter().any(|r| r.id == id) {
            reachable.push(AccountRef {
                id: id.clone(),
                added_at: now,
            });
        }

        match session.accounts.iter().position(|a| a.has_id(&id)) {
            Some(index) => {
                if account.added_at.is_none() {
                    account.added_at = session.accounts[index].added_at;
                }
                account.added_at.get_or_insert(now);
                session.accounts[index] = account;
            }
            None => {
                account.added_at.get_or_insert(now);
                session.accounts.push(account);
            }
        }
    }

    login.accounts = reachable;
    session.accounts.sort_by(|a, b| b.added_at.cmp(&a.added_at));
}

/// Drop accounts that no login references.
pub fn prune_accounts(session: &mut Session) {
    let referenced: HashSet<&str> = session
        .logins
        .iter()
        .flat_map(|login| login.accounts.iter().map(|a| a.id.as_str()))
        .collect();

    let before = session.accounts.len();
    let kept: Vec<Account> = session
        .accounts
        .iter()
        .filter(|account| {
            account
                .id()
                .is_some_and(|id| referenced.contains(id.as_str()))
        })
        .cloned()
        .collect();
    session.accounts = kept;

    if session.accounts.len() != before {
        tracing::debug!(
            removed = before - session.accounts.len(),
            remaining = session.accounts.len(),
            "Pruned unreachable accounts"
        );
    }
}

/// Re-derive `account_id`, `id` and `token` after the logins changed.
pub fn refresh_current_account(session: &mut Session) {
    if let [only] = session.accounts.as_slice() {
        if let Some(id) = only.id() {
            if let Some(token) = lookup_token(session, &id).map(str::to_string) {
                session.account_id = Some(id.clone());
                session.id = Some(id);
                session.token = Some(token);
                return;
            }
        }
    }

    let still_reachable = session
        .account_id
        .as_deref()
        .and_then(|id| lookup_token(session, id))
        .map(str::to_string);

    match still_reachable {
        Some(token) => {
            session.id = session.account_id.clone();
            session.token = Some(token);
        }
        None => session.clear_selection(),
    }
}

/// Explicitly select `account_id` as the current account.
///
/// Selecting an account no login can reach is a caller error.
pub fn select_account(session: &mut Session, account_id: &str) -> Result<()> {
    let token = lookup_token(session, account_id)
        .map(str::to_string)
        .ok_or_else(|| SessionError::UnreachableAccount(account_id.to_string()))?;

    session.token = Some(token);
    session.account_id = Some(account_id.to_string());
    session.id = Some(account_id.to_string());

    Ok(())
}

/// Upsert `login` with its freshly verified `accounts`.
pub fn update_session(
    session: &mut Session,
    mut login: Login,
    mut accounts: Vec<Account>,
    now: DateTime<Utc>,
) {
    login.added_at.get_or_insert(now);

    accounts.retain(|account| {
        let has_id = account.id().is_some();
        if !has_id {
            tracing::warn!(
                fields = ?account.fields.keys().collect::<Vec<_>>(),
                "Discarding account without an identifier"
            );
        }
        has_id
    });

    // With several accounts the caller has to choose
    login.selected_account_id = match accounts.as_slice() {
        [only] => only.id(),
        _ => None,
    };

    merge_accounts(session, &mut login, accounts, now);

    match session
        .logins
        .iter()
        .position(|other| login.same_identity(other))
    {
        Some(index) => session.logins[index] = login,
        None => session.logins.push(login),
    }

    prune_accounts(session);
    refresh_current_account(session);

    session.logins.sort_by(|a, b| b.added_at.cmp(&a.added_at));

    tracing::debug!(
        logins = session.logins.len(),
        accounts = session.accounts.len(),
        account_id = ?session.account_id,
        "Session updated"
    );
}
