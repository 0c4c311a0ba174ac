//! Account records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aliases;

/// An identity-bearing record returned by the provider.
///
/// The provider's fields are kept as-is; only `addedAt` is interpreted
/// locally. The identifier is derived from [`aliases::ACCOUNT_ID`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// When this account first entered the session
    #[serde(
        rename = "addedAt",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub added_at: Option<DateTime<Utc>>,
    /// Opaque provider fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Account {
    /// Build an account from a raw provider record
    pub fn from_record(mut fields: Map<String, Value>) -> Self {
        let added_at = aliases::first_timestamp(&fields, aliases::ADDED_AT);
        for alias in aliases::ADDED_AT {
            fields.remove(*alias);
        }

        Self { added_at, fields }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.into()));
        Self {
            added_at: None,
            fields,
        }
    }

    /// Derived identifier
    pub fn id(&self) -> Option<String> {
        aliases::first_string(&self.fields, aliases::ACCOUNT_ID)
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id().as_deref() == Some(id)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A login's record of one account it can reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: String,
    #[serde(rename = "addedAt", with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
}
