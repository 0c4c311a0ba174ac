//! Provider response interpretation

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use passage_session::aliases::is_truthy;
use passage_session::{Account, Login};

use crate::error::VerifyError;
use crate::Result;

/// Message used when the provider returns nothing at all
pub const UNKNOWN_ACCOUNTS_ERROR: &str = "Unknown Error when retrieving accounts";

/// Fields that may wrap the account list, in precedence order
const ACCOUNT_LIST_FIELDS: &[&str] = &["accounts", "result", "results"];

/// A login paired with the accounts its token reached
#[derive(Debug, Clone, PartialEq)]
pub struct Verified {
    pub login: Login,
    pub accounts: Vec<Account>,
}

/// Interpret an accounts response body.
///
/// Precedence: the first truthy `accounts`/`result`/`results` field, then
/// the raw body, then a synthesized unknown error.
pub fn interpret_accounts(body: Value) -> Result<Vec<Account>> {
    let wrapped = match &body {
        Value::Object(map) => ACCOUNT_LIST_FIELDS
            .iter()
            .filter_map(|field| map.get(*field))
            .find(|value| is_truthy(value))
            .cloned(),
        _ => None,
    };

    let candidate = match wrapped {
        Some(value) => value,
        None if is_truthy(&body) => body,
        None => json!({ "error": { "message": UNKNOWN_ACCOUNTS_ERROR } }),
    };

    if let Some(message) = provider_error(&candidate) {
        tracing::error!(message = %message, "Provider rejected account lookup");
        return Err(VerifyError::Provider(message));
    }

    let Value::Array(items) = candidate else {
        tracing::error!(body = %candidate, "Account lookup returned an unexpected shape");
        return Err(VerifyError::UnknownResponseShape(candidate.to_string()));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(Account::from_record(record)),
            other => Err(VerifyError::UnknownResponseShape(other.to_string())),
        })
        .collect()
}

/// Interpret a token grant response as a login for `username`.
pub fn interpret_grant(body: Value, username: &str, now: DateTime<Utc>) -> Result<Login> {
    if let Value::Object(params) = &body {
        if let Some(login) = Login::from_token_params(params, Some(username), now) {
            return Ok(login);
        }
    }

    if let Some(message) = provider_error(&body) {
        return Err(VerifyError::Provider(message));
    }

    if let Value::String(text) = &body {
        return Err(VerifyError::Provider(format!(
            "[Unknown Error] Message: {}",
            text
        )));
    }

    tracing::error!(body = %body, "Could not retrieve password grant token");
    Err(VerifyError::UnknownResponseShape(body.to_string()))
}

/// Message of a structured `{error: {message}}` body
fn provider_error(value: &Value) -> Option<String> {
    let error = value.get("error").filter(|e| is_truthy(e))?;

    let message = match error {
        Value::String(text) => text.clone(),
        other => match other.get("message") {
            Some(Value::String(text)) => text.clone(),
            _ => other.to_string(),
        },
    };

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_ids(accounts: &[Account]) -> Vec<String> {
        accounts.iter().filter_map(Account::id).collect()
    }

    #[test]
    fn test_raw_array() {
        let accounts = interpret_accounts(json!([{"id": "a"}, {"appScopedId": "b"}])).unwrap();
        assert_eq!(account_ids(&accounts), vec!["a", "b"]);
    }

    #[test]
    fn test_wrapped_field_precedence() {
        let body = json!({
            "results": [{"id": "from-results"}],
            "accounts": [{"id": "from-accounts"}]
        });
        assert_eq!(
            account_ids(&interpret_accounts(body).unwrap()),
            vec!["from-accounts"]
        );

        let body = json!({"accounts": null, "result": [{"id": "from-result"}]});
        assert_eq!(
            account_ids(&interpret_accounts(body).unwrap()),
            vec!["from-result"]
        );
    }

    #[test]
    fn test_empty_list_is_accepted() {
        let accounts = interpret_accounts(json!({"accounts": []})).unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_structured_error_passes_message_through() {
        let err = interpret_accounts(json!({"error": {"message": "bad creds"}})).unwrap_err();
        assert!(matches!(err, VerifyError::Provider(ref m) if m == "bad creds"));
        assert_eq!(err.provider_message(), Some("bad creds"));
    }

    #[test]
    fn test_empty_body_synthesizes_unknown_error() {
        let err = interpret_accounts(Value::Null).unwrap_err();
        assert_eq!(err.provider_message(), Some(UNKNOWN_ACCOUNTS_ERROR));

        let err = interpret_accounts(json!("")).unwrap_err();
        assert_eq!(err.provider_message(), Some(UNKNOWN_ACCOUNTS_ERROR));
    }

    #[test]
    fn test_unknown_shape() {
        let err = interpret_accounts(json!({"status": "ok"})).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownResponseShape(_)));

        let err = interpret_accounts(json!(["not-an-object"])).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownResponseShape(_)));
    }

    #[test]
    fn test_grant_token_becomes_login() {
        let now = Utc::now();
        let login =
            interpret_grant(json!({"accessToken": "t1", "expiresAt": 5_000}), "ada", now).unwrap();

        assert_eq!(login.token, "t1");
        assert_eq!(login.login_id.as_deref(), Some("ada"));
        assert_eq!(login.expires_at, DateTime::from_timestamp_millis(5_000).unwrap());
    }

    #[test]
    fn test_grant_errors() {
        let now = Utc::now();

        let err = interpret_grant(json!({"error": {"message": "locked"}}), "ada", now).unwrap_err();
        assert_eq!(err.provider_message(), Some("locked"));

        let err = interpret_grant(json!("gateway down"), "ada", now).unwrap_err();
        assert_eq!(
            err.provider_message(),
            Some("[Unknown Error] Message: gateway down")
        );

        let err = interpret_grant(json!({"weird": true}), "ada", now).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownResponseShape(_)));
    }
}
