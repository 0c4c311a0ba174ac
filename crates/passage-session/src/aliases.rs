//! Field alias resolution
//!
//! Providers spell the same logical field several ways. Each logical field has
//! an ordered alias list; the first alias holding a truthy value wins.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Account identifier
pub const ACCOUNT_ID: &[&str] = &["appScopedId", "app_scoped_id", "id"];
/// Bearer token in completion or grant parameters
pub const TOKEN: &[&str] = &["access_token", "accessToken", "token"];
/// Token expiry
pub const EXPIRES_AT: &[&str] = &["expires_at", "expiresAt"];
/// App-scoped id attached to a login
pub const APP_SCOPED_ID: &[&str] = &["app_scoped_id", "appScopedId"];
/// Correlation state of an interactive login
pub const STATE: &[&str] = &["browser_state", "state"];
/// Account `addedAt` stamp
pub const ADDED_AT: &[&str] = &["addedAt", "added_at"];

/// `null`, `false`, `0` and `""` carry no value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn first_present<'a>(fields: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .find(|value| is_truthy(value))
}

/// First alias holding a string or number, rendered as a string
pub fn first_string(fields: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .filter(|value| is_truthy(value))
        .find_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// First alias holding a timestamp: epoch milliseconds (number or numeric
/// string) or RFC 3339
pub fn first_timestamp(fields: &Map<String, Value>, aliases: &[&str]) -> Option<DateTime<Utc>> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .filter(|value| is_truthy(value))
        .find_map(parse_timestamp)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        _ => None,
    }
}
