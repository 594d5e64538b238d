//! Unified error type of the client.

use insales_http::ConnectionError;
use insales_xml::XmlError;

/// Errors returned by [`Client`](crate::Client).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body could not be composed or the response could not be parsed.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The request failed or returned a non-2xx status.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl Error {
    /// HTTP status code if the API rejected the request.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Connection(err) => err.status(),
            Self::Xml(_) => None,
        }
    }
}
