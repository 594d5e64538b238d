//! Connection configuration.
//!
//! [`ConnectionConfig`] holds the credentials of one InSales account together
//! with the retry and throttle policy. It can be built in code or loaded from
//! `INSALES_*` environment variables.

use std::fmt;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::error::ConnectionError;
use crate::throttle::{DEFAULT_MAX_WAIT, Throttle};

/// Configuration of a [`Connection`](crate::Connection).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use insales_http::{ConnectionConfig, Throttle};
///
/// let config = ConnectionConfig::builder()
///     .account("myshop")
///     .api_key("key")
///     .password("secret")
///     .secure(true)
///     .throttle(Throttle::Default)
///     .build();
///
/// assert_eq!(config.base_url(), "https://myshop.myinsales.ru");
/// assert_eq!(config.retry_timeout, Duration::from_secs(1));
/// ```
#[derive(Clone, TypedBuilder)]
pub struct ConnectionConfig {
    /// Account (shop) identifier, the subdomain of `myinsales.ru`.
    #[builder(setter(into))]
    pub account: String,

    /// API key used as the Basic auth user name.
    #[builder(setter(into))]
    pub api_key: String,

    /// API password.
    #[builder(setter(into))]
    pub password: String,

    /// Use HTTPS instead of HTTP.
    #[builder(default = false)]
    pub secure: bool,

    /// Retry after a 503 response.
    #[builder(default = false)]
    pub retry_on_503: bool,

    /// Retry after a connection-level failure.
    #[builder(default = false)]
    pub retry_on_socket_error: bool,

    /// Delay before a retry when the server gives no `Retry-After`.
    #[builder(default = Duration::from_secs(1))]
    pub retry_timeout: Duration,

    /// Timeout of a single HTTP exchange.
    #[builder(default = Duration::from_secs(10))]
    pub response_timeout: Duration,

    /// Cap on any single retry or throttle delay.
    #[builder(default = DEFAULT_MAX_WAIT)]
    pub max_wait: Duration,

    /// Client-side throttling policy.
    #[builder(default)]
    pub throttle: Throttle,

    /// Base URL overriding `http(s)://{account}.myinsales.ru`.
    #[builder(default, setter(strip_option, into))]
    pub endpoint: Option<String>,
}

impl ConnectionConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `INSALES_ACCOUNT` | required |
    /// | `INSALES_API_KEY` | required |
    /// | `INSALES_PASSWORD` | required |
    /// | `INSALES_SECURE` | `false` |
    /// | `INSALES_RETRY_ON_503` | `false` |
    /// | `INSALES_RETRY_ON_SOCKET_ERROR` | `false` |
    /// | `INSALES_RETRY_TIMEOUT` | `1` (seconds) |
    /// | `INSALES_RESPONSE_TIMEOUT` | `10` (seconds) |
    /// | `INSALES_THROTTLE` | `false` |
    /// | `INSALES_ENDPOINT` | unset |
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Config`] if a credential is missing or a
    /// timeout is not a non-negative number of seconds.
    pub fn from_env() -> Result<Self, ConnectionError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConnectionError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConnectionError::Config(format!("{name} is not set")))
        };

        let mut config = Self::builder()
            .account(required("INSALES_ACCOUNT")?)
            .api_key(required("INSALES_API_KEY")?)
            .password(required("INSALES_PASSWORD")?)
            .build();

        if let Some(v) = lookup("INSALES_SECURE") {
            config.secure = parse_bool(&v);
        }
        if let Some(v) = lookup("INSALES_RETRY_ON_503") {
            config.retry_on_503 = parse_bool(&v);
        }
        if let Some(v) = lookup("INSALES_RETRY_ON_SOCKET_ERROR") {
            config.retry_on_socket_error = parse_bool(&v);
        }
        if let Some(v) = lookup("INSALES_RETRY_TIMEOUT") {
            config.retry_timeout = parse_seconds("INSALES_RETRY_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("INSALES_RESPONSE_TIMEOUT") {
            config.response_timeout = parse_seconds("INSALES_RESPONSE_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("INSALES_THROTTLE") {
            config.throttle = Throttle::from(parse_bool(&v));
        }
        if let Some(v) = lookup("INSALES_ENDPOINT").filter(|v| !v.is_empty()) {
            config.endpoint = Some(v);
        }

        Ok(config)
    }

    /// Base URL all request paths are appended to, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => {
                let scheme = if self.secure { "https" } else { "http" };
                format!("{scheme}://{}.myinsales.ru", self.account)
            }
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("api_key", &self.api_key)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .field("retry_on_503", &self.retry_on_503)
            .field("retry_on_socket_error", &self.retry_on_socket_error)
            .field("retry_timeout", &self.retry_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("max_wait", &self.max_wait)
            .field("throttle", &self.throttle)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_seconds(name: &str, value: &str) -> Result<Duration, ConnectionError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            ConnectionError::Config(format!("{name} must be a number of seconds, got {value:?}"))
        })
}
