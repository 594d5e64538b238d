//! Compose, send and parse in one call.

use bytes::Bytes;
use insales_http::{Connection, ConnectionConfig, Method, Query};
use insales_xml::{ArrayNames, Value, from_xml, to_xml};
use tracing::debug;

use crate::error::Error;

/// Client of one InSales account.
///
/// Request values are composed with the client's [`ArrayNames`] table
/// ([`ArrayNames::insales`] by default) and responses are decoded into
/// [`Value`] trees. An empty response body decodes to `None`.
#[derive(Debug, Clone)]
pub struct Client {
    connection: Connection,
    arrays: ArrayNames,
}

impl Client {
    /// Wrap an existing connection.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            arrays: ArrayNames::insales(),
        }
    }

    /// Open a connection from `config` and wrap it.
    pub fn from_config(config: ConnectionConfig) -> Result<Self, Error> {
        Ok(Self::new(Connection::new(config)?))
    }

    /// Replace the plural→singular table used when composing arrays.
    #[must_use]
    pub fn with_arrays(mut self, arrays: ArrayNames) -> Self {
        self.arrays = arrays;
        self
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The plural→singular table used when composing arrays.
    #[must_use]
    pub fn arrays(&self) -> &ArrayNames {
        &self.arrays
    }

    /// `GET` a resource or collection.
    pub async fn get(&self, path: &str, query: &Query) -> Result<Option<Value>, Error> {
        self.send(Method::GET, path, query, None).await
    }

    /// `POST` a new resource wrapped in a `root` element.
    pub async fn create(
        &self,
        path: &str,
        root: &str,
        value: &Value,
    ) -> Result<Option<Value>, Error> {
        self.send(Method::POST, path, &Query::new(), Some((root, value)))
            .await
    }

    /// `POST` to a non-create action, e.g. a delivery price calculation.
    pub async fn post(
        &self,
        path: &str,
        root: &str,
        value: &Value,
    ) -> Result<Option<Value>, Error> {
        self.send(Method::POST, path, &Query::new(), Some((root, value)))
            .await
    }

    /// `PUT` changes to an existing resource wrapped in a `root` element.
    pub async fn update(
        &self,
        path: &str,
        root: &str,
        value: &Value,
    ) -> Result<Option<Value>, Error> {
        self.send(Method::PUT, path, &Query::new(), Some((root, value)))
            .await
    }

    /// `DELETE` a resource.
    pub async fn delete(&self, path: &str) -> Result<Option<Value>, Error> {
        self.send(Method::DELETE, path, &Query::new(), None).await
    }

    /// Compose the optional `(root, value)` payload, send it and decode the
    /// response.
    ///
    /// A composing error fails before anything is sent.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        payload: Option<(&str, &Value)>,
    ) -> Result<Option<Value>, Error> {
        let body = payload
            .map(|(root, value)| to_xml(root, value, &self.arrays))
            .transpose()?
            .map(Bytes::from);

        let response = self.connection.request(method, path, query, body).await?;
        let value = from_xml(&response)?;
        let kind = value.as_ref().map_or("empty", |v| v.kind());
        debug!(path, kind, "decoded response");
        Ok(value)
    }
}
