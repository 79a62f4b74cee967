//! Tailscale admin API client.
//!
//! One client per (endpoint, tailnet, credential) triple. Requests carry
//! either HTTP basic auth (the API key as username, empty password) or a
//! bearer token obtained through the OAuth client-credential grant.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::types::{AuthKey, CreateKeyRequest, KeyCapabilities, TokenResponse};

/// Bearer tokens this close to expiry are exchanged again instead of reused.
const TOKEN_REFRESH_SLACK: Duration = Duration::from_secs(30);

/// How the client authenticates against the admin API.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Static API key, sent as basic auth with the key as username.
    ApiKey(String),
    /// OAuth client credentials, exchanged for a bearer token on demand.
    OAuthClientCredentials {
        /// OAuth client ID.
        client_id: String,
        /// OAuth client secret.
        client_secret: String,
        /// Scopes requested with the grant.
        scopes: Vec<String>,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.debug_tuple("ApiKey").field(&"[redacted]").finish(),
            Self::OAuthClientCredentials {
                client_id, scopes, ..
            } => f
                .debug_struct("OAuthClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"[redacted]")
                .field("scopes", scopes)
                .finish(),
        }
    }
}

/// A bearer token from the token endpoint, reused until near expiry.
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn from_response(response: TokenResponse) -> Self {
        let expires_at = response
            .expires_in
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));

        Self {
            access_token: response.access_token,
            expires_at,
        }
    }

    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() + TOKEN_REFRESH_SLACK < expires_at,
            None => true,
        }
    }
}

/// Admin API client bound to one tailnet and one credential.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    tailnet: String,
    auth: Auth,
    token: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("tailnet", &self.tailnet)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client for the given API endpoint and tailnet.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a valid URL or the HTTP
    /// client fails to build.
    pub fn new(api_url: &str, tailnet: impl Into<String>, auth: Auth) -> ApiResult<Self> {
        let base_url = Url::parse(api_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            tailnet: tailnet.into(),
            auth,
            token: Mutex::new(None),
        })
    }

    /// Build the absolute URL for an API path.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Create a new device auth key with the given capabilities.
    ///
    /// The returned key reflects what the API actually granted, which may
    /// differ from the request.
    ///
    /// # Errors
    /// Surfaces transport failures and API rejections verbatim.
    #[instrument(skip(self))]
    pub async fn create_key(&self, capabilities: KeyCapabilities) -> ApiResult<AuthKey> {
        let url = self.endpoint(&format!("api/v2/tailnet/{}/keys", self.tailnet));
        let request = self.authorize(self.http.post(url)).await?;
        let response = request
            .json(&CreateKeyRequest { capabilities })
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(api_error(response).await)
        }
    }

    /// Attach credentials to an outgoing request.
    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ApiResult<reqwest::RequestBuilder> {
        match &self.auth {
            Auth::ApiKey(key) => Ok(request.basic_auth(key, Some(""))),
            Auth::OAuthClientCredentials {
                client_id,
                client_secret,
                scopes,
            } => {
                let token = self.access_token(client_id, client_secret, scopes).await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Return a bearer token, exchanging the client credentials when no
    /// fresh one is cached.
    async fn access_token(
        &self,
        client_id: &str,
        client_secret: &str,
        scopes: &[String],
    ) -> ApiResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let mut params = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
        ];
        if !scopes.is_empty() {
            params.push(("scope", scopes.join(" ")));
        }

        let response = self
            .http
            .post(self.endpoint("api/v2/oauth/token"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(token_error(response).await);
        }

        let token = CachedToken::from_response(response.json().await?);
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }
}

/// Error body shape the admin API reports failures with.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// OAuth error shape the token endpoint reports failures with.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

async fn api_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |e| e.message);

    ApiError::Api { status, message }
}

async fn token_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<TokenErrorBody>(&body).map_or_else(
        |_| body,
        |e| match e.error_description {
            Some(description) => format!("{}: {description}", e.error),
            None => e.error,
        },
    );

    ApiError::TokenExchange { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_key_auth() -> Auth {
        Auth::ApiKey("tskey-test".into())
    }

    fn oauth_auth() -> Auth {
        Auth::OAuthClientCredentials {
            client_id: "oc-1".into(),
            client_secret: "hunter2".into(),
            scopes: vec!["devices".into()],
        }
    }

    async fn setup_client(auth: Auth) -> (MockServer, Client) {
        let mock_server = MockServer::start().await;
        let client = Client::new(&mock_server.uri(), "example.com", auth).unwrap();
        (mock_server, client)
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client =
            Client::new("https://api.tailscale.com", "example.com", api_key_auth()).unwrap();

        assert_eq!(
            client.endpoint("api/v2/tailnet/example.com/keys"),
            "https://api.tailscale.com/api/v2/tailnet/example.com/keys"
        );
    }

    #[test]
    fn invalid_api_url_rejected_at_construction() {
        let result = Client::new("not a url", "example.com", api_key_auth());
        assert!(matches!(result, Err(ApiError::InvalidApiUrl(_))));
    }

    #[test]
    fn debug_redacts_credentials() {
        let api_key = format!("{:?}", Auth::ApiKey("tskey-super-secret".into()));
        assert!(api_key.contains("[redacted]"));
        assert!(!api_key.contains("tskey-super-secret"));

        let oauth = format!("{:?}", oauth_auth());
        assert!(oauth.contains("oc-1"));
        assert!(oauth.contains("[redacted]"));
        assert!(!oauth.contains("hunter2"));
    }

    #[tokio::test]
    async fn create_key_sends_basic_auth_and_capabilities() {
        let (mock_server, client) = setup_client(api_key_auth()).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/tailnet/example.com/keys"))
            .and(header("authorization", "Basic dHNrZXktdGVzdDo="))
            .and(body_json(serde_json::json!({
                "capabilities": {
                    "devices": {
                        "create": {
                            "reusable": false,
                            "ephemeral": true,
                            "preauthorized": true,
                            "tags": ["tag:server"]
                        }
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "k123",
                "key": "tskey-auth-k123",
                "created": "2022-03-15T12:00:00Z",
                "expires": "2022-06-13T12:00:00Z",
                "capabilities": {
                    "devices": {
                        "create": {
                            "reusable": false,
                            "ephemeral": true,
                            "preauthorized": true,
                            "tags": ["tag:server"]
                        }
                    }
                }
            })))
            .mount(&mock_server)
            .await;

        let mut capabilities = KeyCapabilities::default();
        capabilities.devices.create.ephemeral = true;
        capabilities.devices.create.preauthorized = true;
        capabilities.devices.create.tags = vec!["tag:server".into()];

        let key = client.create_key(capabilities).await.unwrap();
        assert_eq!(key.id, "k123");
        assert_eq!(key.key, "tskey-auth-k123");
        assert!(key.expires.is_some());
        assert_eq!(key.capabilities.devices.create.tags, vec!["tag:server"]);
    }

    #[tokio::test]
    async fn create_key_surfaces_api_error_message() {
        let (mock_server, client) = setup_client(api_key_auth()).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/tailnet/example.com/keys"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "invalid key"
            })))
            .mount(&mock_server)
            .await;

        let err = client
            .create_key(KeyCapabilities::default())
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid key");
            }
            _ => panic!("expected Api error, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn create_key_surfaces_raw_body_when_not_json() {
        let (mock_server, client) = setup_client(api_key_auth()).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/tailnet/example.com/keys"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let err = client
            .create_key(KeyCapabilities::default())
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            _ => panic!("expected Api error, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn oauth_flow_exchanges_credentials_then_sends_bearer() {
        let (mock_server, client) = setup_client(oauth_auth()).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=oc-1"))
            .and(body_string_contains("scope=devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v2/tailnet/example.com/keys"))
            .and(header("authorization", "Bearer at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "12345",
                "key": "test"
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let first = client.create_key(KeyCapabilities::default()).await.unwrap();
        assert_eq!(first.id, "12345");
        assert_eq!(first.key, "test");

        // Second call reuses the cached token: the token endpoint sees one request.
        client.create_key(KeyCapabilities::default()).await.unwrap();
    }

    #[tokio::test]
    async fn token_exchange_failure_reports_oauth_error() {
        let (mock_server, client) = setup_client(oauth_auth()).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "bad credentials"
            })))
            .mount(&mock_server)
            .await;

        let err = client
            .create_key(KeyCapabilities::default())
            .await
            .unwrap_err();
        match err {
            ApiError::TokenExchange { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid_client: bad credentials");
            }
            _ => panic!("expected TokenExchange error, got {err:?}"),
        }
    }
}
