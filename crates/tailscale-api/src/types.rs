//! Admin API wire types.
//!
//! Shapes follow the `/api/v2` key endpoints. Response fields are
//! serde-defaulted so a minimal reply (`{"id": "...", "key": "..."}`)
//! still parses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability flags for a new auth key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyCapabilities {
    /// Device-related capabilities.
    pub devices: Devices,
}

/// Device capability group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Devices {
    /// Capabilities granted to devices created with the key.
    pub create: CreateCapabilities,
}

/// What devices joining with the key are allowed to be.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateCapabilities {
    /// Whether the key may be used more than once.
    pub reusable: bool,
    /// Whether devices joining with the key are removed when they go offline.
    pub ephemeral: bool,
    /// Whether devices joining with the key skip manual authorization.
    pub preauthorized: bool,
    /// ACL tags applied to devices joining with the key.
    pub tags: Vec<String>,
}

/// Request body for key creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateKeyRequest {
    /// Requested capability flags.
    pub capabilities: KeyCapabilities,
}

/// An auth key as echoed by the API.
///
/// The capability flags reflect what the API actually granted, which may
/// differ from the request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthKey {
    /// Key ID.
    pub id: String,
    /// The secret key material. Only present on creation responses.
    #[serde(default)]
    pub key: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Expiry timestamp. Absent when the API reports none.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// Granted capability flags.
    #[serde(default)]
    pub capabilities: KeyCapabilities,
}

/// OAuth token grant response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The bearer token.
    pub access_token: String,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: String,
    /// Seconds until the token expires.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Scopes actually granted.
    #[serde(default)]
    pub scope: Option<String>,
}
