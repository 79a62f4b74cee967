//! Backend configuration: validation, persistence, client construction.
//!
//! One record exists per mount, stored under [`CONFIG_STORAGE_KEY`].
//! Updates replace it wholesale; there is no field-level merge.

use std::fmt;

use serde::{Deserialize, Serialize};
use tailscale_api::{ApiResult, Auth, Client, DEFAULT_API_URL};
use thiserror::Error;

use crate::storage::{Storage, StorageEntry, StorageError};

/// Storage key the configuration record lives under.
pub const CONFIG_STORAGE_KEY: &str = "config";

/// Configuration validation errors. Each names the field to correct.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No tailnet was provided.
    #[error("provided tailnet cannot be empty")]
    MissingTailnet,

    /// Neither an API key nor an OAuth client ID was provided.
    #[error("one of api_key or oauth_client_id cannot be empty")]
    MissingCredential,

    /// The API endpoint was explicitly set to an empty string.
    #[error("provided api_url cannot be empty")]
    MissingApiUrl,
}

/// The stored configuration record.
///
/// Empty strings mean unset. Read-back returns the record verbatim,
/// credentials included; only `Debug` output redacts them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Tailnet the backend issues keys for.
    pub tailnet: String,
    /// Static API key. Preferred over OAuth when set.
    #[serde(default)]
    pub api_key: String,
    /// Tailscale API base URL.
    #[serde(default)]
    pub api_url: String,
    /// OAuth client ID.
    #[serde(default)]
    pub oauth_client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub oauth_client_secret: String,
    /// Scopes requested with the OAuth client-credential grant.
    #[serde(default)]
    pub oauth_scopes: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tailnet", &self.tailnet)
            .field("api_key", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("oauth_client_id", &self.oauth_client_id)
            .field("oauth_client_secret", &"[redacted]")
            .field("oauth_scopes", &self.oauth_scopes)
            .finish()
    }
}

impl Config {
    /// Validate a complete candidate record.
    ///
    /// Checks run in a fixed order: tailnet, credential material, endpoint.
    ///
    /// # Errors
    /// Returns the first failing check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tailnet.is_empty() {
            return Err(ConfigError::MissingTailnet);
        }
        if self.api_key.is_empty() && self.oauth_client_id.is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        if self.api_url.is_empty() {
            return Err(ConfigError::MissingApiUrl);
        }

        Ok(())
    }

    /// Resolve which credential the upstream client will use.
    ///
    /// A static API key wins over OAuth client credentials.
    #[must_use]
    pub fn auth(&self) -> Auth {
        if self.api_key.is_empty() {
            Auth::OAuthClientCredentials {
                client_id: self.oauth_client_id.clone(),
                client_secret: self.oauth_client_secret.clone(),
                scopes: self.oauth_scopes.clone(),
            }
        } else {
            Auth::ApiKey(self.api_key.clone())
        }
    }

    /// Build an upstream client from this record.
    ///
    /// # Errors
    /// Returns an error if the endpoint URL is malformed or the HTTP
    /// client fails to build.
    pub fn client(&self) -> ApiResult<Client> {
        Client::new(&self.api_url, &self.tailnet, self.auth())
    }

    /// Load the stored record, if any.
    ///
    /// A missing record is `Ok(None)`; an unreadable one is an error.
    ///
    /// # Errors
    /// Propagates storage and codec faults.
    pub async fn load(storage: &dyn Storage) -> Result<Option<Self>, StorageError> {
        match storage.get(CONFIG_STORAGE_KEY).await? {
            Some(entry) => Ok(Some(entry.decode_json()?)),
            None => Ok(None),
        }
    }

    /// Persist this record, replacing any previous one.
    ///
    /// # Errors
    /// Propagates codec and storage faults.
    pub async fn store(&self, storage: &dyn Storage) -> Result<(), StorageError> {
        storage
            .put(StorageEntry::json(CONFIG_STORAGE_KEY, self)?)
            .await
    }
}

/// A complete configuration candidate as submitted by the caller.
///
/// `api_url` is optional so an omitted endpoint takes [`DEFAULT_API_URL`]
/// while an explicitly empty one is rejected.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    /// Tailnet to issue keys for. Required.
    pub tailnet: String,
    /// Static API key.
    pub api_key: String,
    /// Tailscale API base URL.
    pub api_url: Option<String>,
    /// OAuth client ID.
    pub oauth_client_id: String,
    /// OAuth client secret.
    pub oauth_client_secret: String,
    /// Scopes requested with the OAuth client-credential grant.
    pub oauth_scopes: Vec<String>,
}

impl fmt::Debug for ConfigUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigUpdate")
            .field("tailnet", &self.tailnet)
            .field("api_key", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("oauth_client_id", &self.oauth_client_id)
            .field("oauth_client_secret", &"[redacted]")
            .field("oauth_scopes", &self.oauth_scopes)
            .finish()
    }
}

impl ConfigUpdate {
    /// Resolve the candidate into a validated record.
    ///
    /// Applies the endpoint default when `api_url` was omitted, then runs
    /// the full validation.
    ///
    /// # Errors
    /// Returns the first failing validation check.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let config = Config {
            tailnet: self.tailnet,
            api_key: self.api_key,
            api_url: self
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            oauth_client_id: self.oauth_client_id,
            oauth_client_secret: self.oauth_client_secret,
            oauth_scopes: self.oauth_scopes,
        };

        config.validate()?;
        Ok(config)
    }
}
