//! Live integration tests against a real InSales shop.
//!
//! These tests need the credentials of a test shop in `INSALES_ACCOUNT`,
//! `INSALES_API_KEY` and `INSALES_PASSWORD` (see
//! [`ConnectionConfig::from_env`](insales::ConnectionConfig::from_env)).
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p insales-integration -- --ignored
//! ```

use std::sync::Once;

use insales::{Client, ConnectionConfig};

mod test_account;
mod test_pages;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Create a client for the test shop configured in the environment.
///
/// Retries and throttling are always on so that repeated runs stay within the
/// shop's request budget.
#[must_use]
pub fn shop_client() -> Client {
    init_tracing();

    let mut config = ConnectionConfig::from_env().expect("INSALES_* credentials must be set");
    config.retry_on_503 = true;
    config.retry_on_socket_error = true;
    config.throttle = insales::Throttle::Default;

    Client::from_config(config).expect("client")
}

/// Generate a unique page title for a test.
#[must_use]
pub fn test_title(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}
