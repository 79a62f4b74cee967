//! Error types for the admin API client.

use thiserror::Error;

/// Convenience alias for admin API results.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the admin API client.
///
/// API rejections carry the authority's own message so callers can surface
/// it verbatim.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured API endpoint is not a valid URL.
    #[error("invalid api_url: {0}")]
    InvalidApiUrl(#[from] url::ParseError),

    /// Transport-level failure: connect, timeout, or body decode.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request.
    #[error("tailscale API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Message reported by the API.
        message: String,
    },

    /// The OAuth token endpoint rejected the client credentials.
    #[error("token exchange failed ({status}): {message}")]
    TokenExchange {
        /// HTTP status code of the response.
        status: u16,
        /// Error reported by the token endpoint.
        message: String,
    },
}
