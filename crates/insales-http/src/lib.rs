//! HTTP transport for the InSales admin API.
//!
//! A [`Connection`] sends authenticated XML requests to one account, waiting
//! on a shared [`ThrottleState`] before each attempt. Retries on 503 and on
//! connection failures are opt-in through [`ConnectionConfig`].
//!
//! ```no_run
//! use insales_http::{Connection, ConnectionConfig, Query};
//!
//! # async fn run() -> Result<(), insales_http::ConnectionError> {
//! let config = ConnectionConfig::builder()
//!     .account("myshop")
//!     .api_key("key")
//!     .password("secret")
//!     .retry_on_503(true)
//!     .build();
//! let conn = Connection::new(config)?;
//! let xml = conn.get("/admin/orders.xml", &Query::new().param("per_page", 10)).await?;
//! # let _ = xml;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod query;
pub mod throttle;

pub use config::ConnectionConfig;
pub use connection::{Connection, USAGE_LIMIT_HEADER};
pub use error::ConnectionError;
pub use query::{Query, QueryValue, format_path};
pub use reqwest::Method;
pub use throttle::{DEFAULT_MAX_WAIT, Throttle, ThrottleFn, ThrottleState, Usage, default_delay};
