//! Transport error types.

/// Errors returned by [`Connection`](crate::Connection).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The final response status was outside `200..300`.
    #[error("{method} request to {path} returned: {status}\n{body}")]
    Api {
        /// HTTP method of the request.
        method: String,
        /// Request path including the query string.
        path: String,
        /// Response status code.
        status: u16,
        /// Response body decoded as (lossy) UTF-8.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The connection configuration is incomplete or invalid.
    #[error("invalid connection configuration: {0}")]
    Config(String),
}

impl ConnectionError {
    /// HTTP status code of an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Config(_) => None,
        }
    }

    /// Raw response body of an API error.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}
