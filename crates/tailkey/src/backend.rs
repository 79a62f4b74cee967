//! The secrets backend: configuration management and key issuance.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tailscale_api::{AuthKey, KeyCapabilities};
use tracing::{info, instrument};

use crate::config::{Config, ConfigUpdate};
use crate::error::{BackendError, BackendResult};
use crate::paths::{Operation, CONFIG_PATH, KEY_PATH};
use crate::storage::Storage;

/// Options for a new device auth key.
///
/// Keys issued by the backend are always single-use; there is no option
/// to request a reusable key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRequest {
    /// ACL tags applied to devices joining with the key.
    pub tags: Vec<String>,
    /// Whether devices joining with the key skip manual authorization.
    pub preauthorized: bool,
    /// Whether devices joining with the key are removed when they go
    /// offline.
    pub ephemeral: bool,
}

impl KeyRequest {
    /// Translate the request into upstream capability flags.
    ///
    /// `reusable` is never set; it stays at the upstream default.
    #[must_use]
    pub fn capabilities(&self) -> KeyCapabilities {
        let mut capabilities = KeyCapabilities::default();
        capabilities.devices.create.tags = self.tags.clone();
        capabilities.devices.create.preauthorized = self.preauthorized;
        capabilities.devices.create.ephemeral = self.ephemeral;
        capabilities
    }
}

/// A freshly issued device auth key.
///
/// Every field comes from the upstream response echo, not from the
/// request: the result reflects what the authority actually granted.
/// Never persisted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct IssuedKey {
    /// Upstream key ID.
    pub id: String,
    /// The secret key material handed to the joining device.
    pub key: String,
    /// Expiry timestamp; absent when upstream reported none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// ACL tags granted to the key.
    pub tags: Vec<String>,
    /// Whether the key may be used more than once.
    pub reusable: bool,
    /// Whether devices joining with the key are ephemeral.
    pub ephemeral: bool,
    /// Whether devices joining with the key skip manual authorization.
    pub preauthorized: bool,
}

impl fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedKey")
            .field("id", &self.id)
            .field("key", &"[redacted]")
            .field("expires", &self.expires)
            .field("tags", &self.tags)
            .field("reusable", &self.reusable)
            .field("ephemeral", &self.ephemeral)
            .field("preauthorized", &self.preauthorized)
            .finish()
    }
}

impl From<AuthKey> for IssuedKey {
    fn from(key: AuthKey) -> Self {
        let create = key.capabilities.devices.create;

        Self {
            id: key.id,
            key: key.key,
            expires: key.expires,
            tags: create.tags,
            reusable: create.reusable,
            ephemeral: create.ephemeral,
            preauthorized: create.preauthorized,
        }
    }
}

/// A routed request as the host hands it over.
#[derive(Clone)]
pub struct Request {
    /// Route path, `key` or `config`.
    pub path: String,
    /// Operation kind.
    pub operation: Operation,
    /// Field data as parsed by the host.
    pub data: Value,
}

impl Request {
    /// Build a request for the given route.
    #[must_use]
    pub fn new(path: impl Into<String>, operation: Operation, data: Value) -> Self {
        Self {
            path: path.into(),
            operation,
            data,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("path", &self.path)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Result payload of a routed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A freshly issued key.
    Key(IssuedKey),
    /// The stored configuration record.
    Configuration(Config),
    /// Success with no data (configuration updates).
    Empty,
}

/// The secrets backend.
///
/// Holds the host-provided storage view; all other state lives upstream
/// or in the stored configuration record.
pub struct Backend {
    storage: Arc<dyn Storage>,
}

impl Backend {
    /// Create a backend over the host's storage view.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Validate and persist a complete configuration record, replacing
    /// any previous one.
    ///
    /// # Errors
    /// Returns the failing validation check; on failure nothing is
    /// written and any prior record is left untouched.
    #[instrument(skip_all)]
    pub async fn update_configuration(&self, update: ConfigUpdate) -> BackendResult<()> {
        let config = update.into_config()?;
        config.store(self.storage.as_ref()).await?;
        info!(tailnet = %config.tailnet, "configuration updated");

        Ok(())
    }

    /// Read back the stored configuration record, credentials included.
    ///
    /// # Errors
    /// [`BackendError::NotConfigured`] when no record has been written
    /// yet; storage and codec faults propagate as-is.
    pub async fn read_configuration(&self) -> BackendResult<Config> {
        Config::load(self.storage.as_ref())
            .await?
            .ok_or(BackendError::NotConfigured)
    }

    /// Issue a new single-use device auth key.
    ///
    /// Reads the stored configuration, builds an upstream client, and
    /// requests a key with the translated capability flags. Every call
    /// issues a brand-new key; upstream failures surface verbatim with no
    /// retry. Nothing is written to storage, so dropping the future
    /// mid-flight leaves no partial state.
    ///
    /// # Errors
    /// [`BackendError::NotConfigured`] before the first configuration
    /// write; otherwise whatever the storage or upstream collaborator
    /// reported.
    #[instrument(skip(self))]
    pub async fn generate_key(&self, request: KeyRequest) -> BackendResult<IssuedKey> {
        let config = self.read_configuration().await?;
        let client = config.client()?;
        let key = client.create_key(request.capabilities()).await?;
        let issued = IssuedKey::from(key);
        info!(key_id = %issued.id, tailnet = %config.tailnet, "issued device auth key");

        Ok(issued)
    }

    /// Route a host request to the matching typed operation.
    ///
    /// Field data is converted into the operation's request struct exactly
    /// once here; handlers never see loosely-typed maps.
    ///
    /// # Errors
    /// [`BackendError::UnsupportedOperation`] for unroutable pairs,
    /// [`BackendError::InvalidRequest`] for field data that does not fit
    /// the input shape, otherwise whatever the operation returns.
    pub async fn handle_request(&self, request: Request) -> BackendResult<Response> {
        match (request.path.as_str(), request.operation) {
            (KEY_PATH, Operation::Read) => {
                let key_request = parse_data(request.data)?;
                Ok(Response::Key(self.generate_key(key_request).await?))
            }
            (CONFIG_PATH, Operation::Read) => {
                Ok(Response::Configuration(self.read_configuration().await?))
            }
            (CONFIG_PATH, Operation::Update) => {
                let update = parse_data(request.data)?;
                self.update_configuration(update).await?;
                Ok(Response::Empty)
            }
            _ => Err(BackendError::UnsupportedOperation {
                path: request.path,
                operation: request.operation,
            }),
        }
    }
}

/// Convert host field data into a typed request struct.
///
/// Absent data counts as an empty field map.
fn parse_data<T: serde::de::DeserializeOwned>(data: Value) -> BackendResult<T> {
    let data = if data.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        data
    };

    serde_json::from_value(data).map_err(BackendError::InvalidRequest)
}
