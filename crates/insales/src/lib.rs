//! Client for the InSales e-commerce admin REST API.
//!
//! Ties together the XML layer ([`insales_xml`]) and the HTTP transport
//! ([`insales_http`]): a [`Client`] composes a [`Value`] into a request body,
//! sends it through a throttled [`Connection`] and decodes the response.
//!
//! ```no_run
//! use insales::{Client, ConnectionConfig, Query, Value};
//!
//! # async fn run() -> Result<(), insales::Error> {
//! let client = Client::from_config(ConnectionConfig::from_env()?)?;
//!
//! let query = Query::new().param("per_page", 5);
//! let orders = client.get("/admin/orders.xml", &query).await?;
//! let page = Value::record([("title", "About")]);
//! let created = client.create("/admin/pages.xml", "page", &page).await?;
//! # let _ = (orders, created);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::Client;
pub use error::Error;
pub use insales_http::{
    Connection, ConnectionConfig, ConnectionError, Method, Query, QueryValue, Throttle,
    ThrottleState, Usage,
};
pub use insales_xml::{ArrayNames, Record, Value, XmlError};
