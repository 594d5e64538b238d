//! insales-fetch - print an InSales admin API resource as JSON.
//!
//! # Usage
//!
//! ```text
//! INSALES_ACCOUNT=myshop INSALES_API_KEY=key INSALES_PASSWORD=secret \
//!     insales-fetch /admin/orders.xml per_page=5 updated_since=2024-01-01T00:00:00+03:00
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `INSALES_ACCOUNT` | *(required)* | Shop subdomain |
//! | `INSALES_API_KEY` | *(required)* | API key |
//! | `INSALES_PASSWORD` | *(required)* | API password |
//! | `INSALES_SECURE` | `false` | Use HTTPS |
//! | `INSALES_RETRY_ON_503` | `false` | Retry when the API is overloaded |
//! | `INSALES_RETRY_ON_SOCKET_ERROR` | `false` | Retry on connection failures |
//! | `INSALES_RETRY_TIMEOUT` | `1` | Retry delay in seconds |
//! | `INSALES_RESPONSE_TIMEOUT` | `10` | Response timeout in seconds |
//! | `INSALES_THROTTLE` | `false` | Slow down as the request budget runs out |
//! | `INSALES_ENDPOINT` | *(unset)* | Base URL override |
//! | `LOG_LEVEL` | `warn` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use anyhow::{Context, Result, bail};
use insales::{Client, ConnectionConfig, Query};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. Logs go to stderr, JSON to stdout.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_owned())
}

/// Split `<path> [key=value ...]` into the request path and its query.
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<(String, Query)> {
    let mut args = args.into_iter();
    let Some(path) = args.next() else {
        bail!("usage: insales-fetch <path> [key=value ...]");
    };

    let mut query = Query::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("query parameter must be key=value, got {arg:?}"))?;
        query.push(key, value);
    }

    Ok((path, query))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&log_level())?;

    let (path, query) = parse_args(std::env::args().skip(1))?;
    let config = ConnectionConfig::from_env().context("failed to load connection configuration")?;
    info!(account = %config.account, path = %path, "fetching");

    let client = Client::from_config(config).context("failed to create client")?;
    let value = client
        .get(&path, &query)
        .await
        .with_context(|| format!("failed to fetch {path}"))?;

    let json = serde_json::to_string_pretty(&value).context("failed to render response as JSON")?;
    println!("{json}");

    Ok(())
}
