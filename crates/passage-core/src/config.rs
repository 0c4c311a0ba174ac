//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use passage_session::DEFAULT_SESSION_KEY;
use passage_verify::{DEFAULT_API_PREFIX, DEFAULT_TOKEN_PATH};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity provider base URI; required
    pub provider_uri: String,
    /// Prefix of the provider's REST API
    pub api_prefix: String,
    /// Token endpoint for password grants
    pub token_path: String,
    /// Authorization dialog for implicit grants
    pub authorization_path: String,
    /// Page that ends the provider's own session
    pub logout_path: String,
    /// URI of this application
    pub app_uri: String,
    /// OAuth client id; defaults to `app_uri`
    pub app_id: Option<String>,
    /// Where the provider sends completions; defaults to `{app_uri}/oauth3.html`
    pub redirect_uri: Option<String>,
    /// Path to the database file
    pub database_path: PathBuf,
    /// Storage key of the session snapshot
    pub session_key: String,
    /// How long the logout frame is given before the session is destroyed
    #[serde(with = "duration_ms")]
    pub logout_grace: Duration,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            provider_uri: String::new(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            authorization_path: "/api/oauth3/authorization_dialog".to_string(),
            logout_path: "/logout.html".to_string(),
            app_uri: String::new(),
            app_id: None,
            redirect_uri: None,
            database_path: data_dir.join("passage.db"),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            logout_grace: Duration::from_millis(500),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Passage"))
            .unwrap_or_else(|| PathBuf::from(".passage"))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check the configuration and return the parsed provider URI
    pub fn validate(&self) -> Result<Url> {
        if self.provider_uri.trim().is_empty() {
            return Err(CoreError::Config("provider_uri is not set".to_string()));
        }

        let provider = Url::parse(&self.provider_uri).map_err(|e| {
            CoreError::Config(format!("provider_uri {}: {}", self.provider_uri, e))
        })?;

        if self.session_key.is_empty() {
            return Err(CoreError::Config("session_key is empty".to_string()));
        }

        Ok(provider)
    }

    pub fn client_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or(&self.app_uri)
    }

    pub fn redirect_uri(&self) -> Result<Url> {
        let raw = match &self.redirect_uri {
            Some(uri) => uri.clone(),
            None => format!("{}/oauth3.html", self.app_uri.trim_end_matches('/')),
        };

        Url::parse(&raw).map_err(|e| CoreError::Config(format!("redirect_uri {}: {}", raw, e)))
    }

    pub fn authorization_endpoint(&self) -> Result<Url> {
        self.provider_path(&self.authorization_path)
    }

    pub fn logout_url(&self) -> Result<Url> {
        self.provider_path(&self.logout_path)
    }

    fn provider_path(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.provider_uri.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| CoreError::Config(format!("{}: {}", raw, e)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

/// Durations as whole milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

// Platform data directory lookup
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
