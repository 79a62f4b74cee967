//! Route catalog the host binds at mount time.
//!
//! Two logical paths: `key` issues auth keys, `config` reads and writes
//! the backend configuration. The field descriptions here are what the
//! host shows operators.

use std::fmt;

use serde::{Deserialize, Serialize};
use tailscale_api::DEFAULT_API_URL;

/// Path for key issuance.
pub const KEY_PATH: &str = "key";

/// Path for configuration reads and writes.
pub const CONFIG_PATH: &str = "config";

/// General backend help shown by the host.
pub const BACKEND_HELP: &str =
    "The Tailscale backend is used to generate Tailscale authentication keys for a configured Tailnet";

/// Operation kinds the host can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read data from a path.
    Read,
    /// Write data to a path.
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Field value kinds, for host-side schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string.
    Str,
    /// Boolean flag.
    Bool,
    /// List of strings.
    StrList,
}

/// One input field of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as it appears in request data.
    pub name: &'static str,
    /// Value kind.
    pub kind: FieldKind,
    /// Help text shown to operators.
    pub description: &'static str,
    /// Whether the field must be present.
    pub required: bool,
    /// Default the host applies when the field is omitted.
    pub default: Option<&'static str>,
}

/// One operation bound on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    /// Operation kind.
    pub operation: Operation,
    /// Summary shown to operators.
    pub summary: &'static str,
}

/// A routable path with its fields and operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSpec {
    /// Route pattern.
    pub pattern: &'static str,
    /// Input fields accepted by the path.
    pub fields: &'static [FieldSpec],
    /// Operations bound on the path.
    pub operations: &'static [OperationSpec],
}

/// The backend's route table.
#[must_use]
pub fn paths() -> &'static [PathSpec] {
    PATHS
}

const PATHS: &[PathSpec] = &[
    PathSpec {
        pattern: KEY_PATH,
        fields: &[
            FieldSpec {
                name: "tags",
                kind: FieldKind::StrList,
                description: "Tags to apply to the device that uses the authentication key",
                required: false,
                default: None,
            },
            FieldSpec {
                name: "preauthorized",
                kind: FieldKind::Bool,
                description: "If true, machines added to the tailnet with this key will not require authorization",
                required: false,
                default: None,
            },
            FieldSpec {
                name: "ephemeral",
                kind: FieldKind::Bool,
                description: "If true, nodes created with this key will be removed after a period of inactivity or when they disconnect from the Tailnet",
                required: false,
                default: None,
            },
        ],
        operations: &[OperationSpec {
            operation: Operation::Read,
            summary: "Generate a single-use authentication key for a device",
        }],
    },
    PathSpec {
        pattern: CONFIG_PATH,
        fields: &[
            FieldSpec {
                name: "tailnet",
                kind: FieldKind::Str,
                description: "The name of the Tailscale Tailnet",
                required: true,
                default: None,
            },
            FieldSpec {
                name: "api_key",
                kind: FieldKind::Str,
                description: "The API key to use for authenticating with the Tailscale API",
                required: false,
                default: None,
            },
            FieldSpec {
                name: "api_url",
                kind: FieldKind::Str,
                description: "The URL of the Tailscale API",
                required: false,
                default: Some(DEFAULT_API_URL),
            },
            FieldSpec {
                name: "oauth_client_id",
                kind: FieldKind::Str,
                description: "The OAuth client ID to use when authenticating with client credentials",
                required: false,
                default: None,
            },
            FieldSpec {
                name: "oauth_client_secret",
                kind: FieldKind::Str,
                description: "The OAuth client secret paired with the client ID",
                required: false,
                default: None,
            },
            FieldSpec {
                name: "oauth_scopes",
                kind: FieldKind::StrList,
                description: "Scopes to request when exchanging the OAuth client credentials",
                required: false,
                default: None,
            },
        ],
        operations: &[
            OperationSpec {
                operation: Operation::Read,
                summary: "Read the current Tailscale backend configuration",
            },
            OperationSpec {
                operation: Operation::Update,
                summary: "Update the Tailscale backend configuration",
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn find(pattern: &str) -> &'static PathSpec {
        paths()
            .iter()
            .find(|spec| spec.pattern == pattern)
            .expect("path not in catalog")
    }

    #[test]
    fn key_path_lists_issuance_fields() {
        let spec = find(KEY_PATH);

        let names: Vec<_> = spec.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["tags", "preauthorized", "ephemeral"]);
        assert_eq!(spec.operations.len(), 1);
        assert_eq!(spec.operations[0].operation, Operation::Read);
    }

    #[test]
    fn preauthorized_help_describes_skipped_authorization() {
        let spec = find(KEY_PATH);

        let field = spec
            .fields
            .iter()
            .find(|f| f.name == "preauthorized")
            .expect("preauthorized field");
        assert_eq!(
            field.description,
            "If true, machines added to the tailnet with this key will not require authorization"
        );
    }

    #[test]
    fn config_path_defaults_api_url() {
        let spec = find(CONFIG_PATH);

        let api_url = spec
            .fields
            .iter()
            .find(|f| f.name == "api_url")
            .expect("api_url field");
        assert_eq!(api_url.default, Some(DEFAULT_API_URL));

        let tailnet = spec
            .fields
            .iter()
            .find(|f| f.name == "tailnet")
            .expect("tailnet field");
        assert!(tailnet.required);
    }

    #[test]
    fn config_path_supports_read_and_update() {
        let spec = find(CONFIG_PATH);

        let operations: Vec<_> = spec.operations.iter().map(|o| o.operation).collect();
        assert_eq!(operations, vec![Operation::Read, Operation::Update]);
    }

    #[test]
    fn operation_displays_lowercase() {
        assert_eq!(Operation::Read.to_string(), "read");
        assert_eq!(Operation::Update.to_string(), "update");
    }
}
