//! Authenticated HTTP transport with retry and throttle handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::ConnectionError;
use crate::query::{Query, format_path};
use crate::throttle::{ThrottleState, Usage};

/// Response header reporting request budget usage.
pub const USAGE_LIMIT_HEADER: &str = "API-Usage-Limit";

/// A fully read HTTP response.
#[derive(Debug)]
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// A connection to the admin API of one InSales account.
///
/// Every request first waits on the shared [`ThrottleState`], then sends one
/// HTTP exchange and loops while the configured retry policy asks for another
/// attempt.
#[derive(Debug, Clone)]
pub struct Connection {
    config: Arc<ConnectionConfig>,
    client: reqwest::Client,
    base_url: String,
    authorization: HeaderValue,
    throttle: Arc<ThrottleState>,
}

impl Connection {
    /// Create a connection with its own throttle state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the credentials
    /// cannot be encoded as a header.
    pub fn new(config: ConnectionConfig) -> Result<Self, ConnectionError> {
        let throttle = Arc::new(ThrottleState::new(config.max_wait));
        Self::with_throttle_state(config, throttle)
    }

    /// Create a connection that shares `throttle` with other connections of
    /// the same account.
    ///
    /// The cap on delays is the one `throttle` was created with.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::new`].
    pub fn with_throttle_state(
        config: ConnectionConfig,
        throttle: Arc<ThrottleState>,
    ) -> Result<Self, ConnectionError> {
        let client = reqwest::Client::builder()
            .timeout(config.response_timeout)
            .build()?;

        let credentials = BASE64.encode(format!("{}:{}", config.api_key, config.password));
        let mut authorization = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| ConnectionError::Config(format!("invalid credentials: {e}")))?;
        authorization.set_sensitive(true);

        Ok(Self {
            base_url: config.base_url(),
            config: Arc::new(config),
            client,
            authorization,
            throttle,
        })
    }

    /// The configuration this connection was built from.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The throttle state this connection waits on.
    #[must_use]
    pub fn throttle_state(&self) -> &Arc<ThrottleState> {
        &self.throttle
    }

    /// Base URL request paths are appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a `GET` request.
    ///
    /// # Errors
    ///
    /// See [`Connection::request`].
    pub async fn get(&self, path: &str, query: &Query) -> Result<Bytes, ConnectionError> {
        self.request(Method::GET, path, query, None).await
    }

    /// Send a `POST` request with an XML body.
    ///
    /// # Errors
    ///
    /// See [`Connection::request`].
    pub async fn post(
        &self,
        path: &str,
        body: impl Into<Bytes>,
    ) -> Result<Bytes, ConnectionError> {
        self.request(Method::POST, path, &Query::new(), Some(body.into()))
            .await
    }

    /// Send a `PUT` request with an XML body.
    ///
    /// # Errors
    ///
    /// See [`Connection::request`].
    pub async fn put(
        &self,
        path: &str,
        body: impl Into<Bytes>,
    ) -> Result<Bytes, ConnectionError> {
        self.request(Method::PUT, path, &Query::new(), Some(body.into()))
            .await
    }

    /// Send a `DELETE` request.
    ///
    /// # Errors
    ///
    /// See [`Connection::request`].
    pub async fn delete(&self, path: &str) -> Result<Bytes, ConnectionError> {
        self.request(Method::DELETE, path, &Query::new(), None).await
    }

    /// Send a request and return the body of the final 2xx response.
    ///
    /// Connection-level failures (connect, timeout, broken request or body)
    /// are retried after `retry_timeout` when `retry_on_socket_error` is set,
    /// and 503 responses are retried after their `Retry-After` (or
    /// `retry_timeout`) when `retry_on_503` is set. With throttling enabled,
    /// the `API-Usage-Limit` header of every response pushes back the start of
    /// the next request.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Api`] if the final status is not 2xx and
    /// [`ConnectionError::Transport`] on a failure that is not retried.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
    ) -> Result<Bytes, ConnectionError> {
        let path = format_path(path, query);
        let url = format!("{}{path}", self.base_url);

        let mut attempt: u32 = 0;
        let exchange = loop {
            attempt += 1;
            self.wait_for_turn().await;
            debug!(%method, %path, attempt, "sending request");

            let exchange = match self.send_once(&method, &url, body.clone()).await {
                Ok(exchange) => exchange,
                Err(err) if self.config.retry_on_socket_error && is_socket_error(&err) => {
                    self.throttle.retry_in(self.config.retry_timeout);
                    warn!(%method, %path, attempt, error = %err, "request failed, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if self.config.throttle.is_enabled() {
                self.apply_usage(&exchange.headers);
            }

            if exchange.status == StatusCode::SERVICE_UNAVAILABLE && self.config.retry_on_503 {
                let delay = retry_after(&exchange.headers).unwrap_or(self.config.retry_timeout);
                self.throttle.retry_in(delay);
                warn!(
                    %method,
                    %path,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "service unavailable, retrying"
                );
                continue;
            }

            break exchange;
        };

        let Exchange { status, body, .. } = exchange;
        debug!(
            %method,
            %path,
            status = status.as_u16(),
            len = body.len(),
            "request finished"
        );

        if status.is_success() {
            Ok(body)
        } else {
            Err(ConnectionError::Api {
                method: method.to_string(),
                path,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }

    /// Send one request and read the whole response body.
    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<Bytes>,
    ) -> reqwest::Result<Exchange> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "application/xml");
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Exchange {
            status,
            headers,
            body,
        })
    }

    /// Sleep until the throttle gate opens and claim the request slot.
    async fn wait_for_turn(&self) {
        while let Some(wait) = self.throttle.try_start(Instant::now()) {
            debug!(wait_ms = wait.as_millis(), "waiting for throttle window");
            tokio::time::sleep(wait).await;
        }
    }

    fn apply_usage(&self, headers: &HeaderMap) {
        let Some(value) = headers.get(USAGE_LIMIT_HEADER) else {
            return;
        };
        let usage = match value
            .to_str()
            .map_err(|e| e.to_string())
            .and_then(str::parse::<Usage>)
        {
            Ok(usage) => usage,
            Err(err) => {
                warn!(header = ?value, error = %err, "ignoring malformed usage limit header");
                return;
            }
        };
        if let Some(delay) = self.config.throttle.delay(usage) {
            self.throttle.extend(delay);
            debug!(
                current = usage.current,
                limit = usage.limit,
                delay_ms = delay.as_millis(),
                "throttling next request"
            );
        }
    }
}

/// Whether `err` happened on the wire and may succeed on another attempt.
///
/// Invalid URLs and other request construction errors are final.
fn is_socket_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request() || err.is_body()
}

/// Parse `Retry-After` given in (possibly fractional) seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::throttle::Throttle;

    struct Canned {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static str,
    }

    impl Canned {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body,
            }
        }

        fn header(mut self, name: &'static str, value: &'static str) -> Self {
            self.headers.push((name, value));
            self
        }
    }

    /// Broken behaviour for one accepted connection.
    #[derive(Debug, Clone, Copy)]
    enum Fault {
        /// Read the request, then close without answering.
        Hangup,
        /// Promise a 100-byte body, send 3 bytes, then close.
        TruncatedBody,
    }

    impl Fault {
        async fn inject(self, mut stream: TcpStream) {
            read_request_head(&mut stream).await;
            if let Self::TruncatedBody = self {
                let head = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n<ok";
                let _ = stream.write_all(head).await;
                let _ = stream.flush().await;
            }
        }
    }

    async fn read_request_head(stream: &mut TcpStream) {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => head.extend_from_slice(&buf[..n]),
            }
        }
    }

    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        uri: String,
        authorization: Option<String>,
        content_type: Option<String>,
        body: Bytes,
    }

    struct MockServer {
        addr: SocketAddr,
        seen: Arc<Mutex<Vec<Seen>>>,
        accepted: Arc<AtomicUsize>,
    }

    impl MockServer {
        async fn start(script: Vec<Canned>) -> Self {
            Self::with_faults(Vec::new(), script).await
        }

        /// The first `faults.len()` connections misbehave; later ones are
        /// answered from `script`.
        async fn with_faults(faults: Vec<Fault>, script: Vec<Canned>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind mock server");
            let addr = listener.local_addr().expect("local addr");
            let mut faults = VecDeque::from(faults);
            let script = Arc::new(Mutex::new(VecDeque::from(script)));
            let seen = Arc::new(Mutex::new(Vec::new()));
            let accepted = Arc::new(AtomicUsize::new(0));

            let server_seen = Arc::clone(&seen);
            let server_accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    server_accepted.fetch_add(1, Ordering::SeqCst);
                    if let Some(fault) = faults.pop_front() {
                        tokio::spawn(fault.inject(stream));
                        continue;
                    }

                    let script = Arc::clone(&script);
                    let seen = Arc::clone(&server_seen);
                    tokio::spawn(async move {
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let script = Arc::clone(&script);
                            let seen = Arc::clone(&seen);
                            async move { Ok::<_, Infallible>(respond(req, &script, &seen).await) }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), svc)
                            .await;
                    });
                }
            });

            Self {
                addr,
                seen,
                accepted,
            }
        }

        fn config(&self) -> ConnectionConfig {
            ConnectionConfig::builder()
                .account("myshop")
                .api_key("key")
                .password("secret")
                .endpoint(format!("http://{}", self.addr))
                .build()
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().clone()
        }

        fn accepted(&self) -> usize {
            self.accepted.load(Ordering::SeqCst)
        }
    }

    async fn respond(
        req: Request<Incoming>,
        script: &Mutex<VecDeque<Canned>>,
        seen: &Mutex<Vec<Seen>>,
    ) -> Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map(|c| c.to_bytes())
            .unwrap_or_default();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        seen.lock().push(Seen {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            authorization: header("authorization"),
            content_type: header("content-type"),
            body,
        });

        let canned = script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Canned::new(500, "unscripted request"));
        let mut builder = Response::builder().status(canned.status);
        for (name, value) in canned.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Full::new(Bytes::from_static(canned.body.as_bytes())))
            .expect("valid canned response")
    }

    fn retrying_socket_errors(mut config: ConnectionConfig) -> ConnectionConfig {
        config.retry_on_socket_error = true;
        config.retry_timeout = Duration::from_millis(10);
        config
    }

    #[tokio::test]
    async fn test_should_send_authenticated_xml_request() {
        let server = MockServer::start(vec![Canned::new(
            200,
            "<order><id type=\"integer\">1</id></order>",
        )])
        .await;
        let conn = Connection::new(server.config()).expect("connection");

        let query = Query::new().param("page", 2);
        let body = conn
            .get("/admin/orders.xml", &query)
            .await
            .expect("request should succeed");
        assert_eq!(body.as_ref(), b"<order><id type=\"integer\">1</id></order>");

        let seen = server.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "GET");
        assert_eq!(seen[0].uri, "/admin/orders.xml?page=2");
        assert_eq!(
            seen[0].authorization.as_deref(),
            Some("Basic a2V5OnNlY3JldA==")
        );
        assert_eq!(seen[0].content_type.as_deref(), Some("application/xml"));
    }

    #[tokio::test]
    async fn test_should_deliver_request_body() {
        let server = MockServer::start(vec![Canned::new(201, "")]).await;
        let conn = Connection::new(server.config()).expect("connection");

        let body = conn
            .post("/admin/pages.xml", "<page><title>About</title></page>")
            .await
            .expect("post");
        assert!(body.is_empty());

        let seen = server.seen();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].body.as_ref(), b"<page><title>About</title></page>");
    }

    #[tokio::test]
    async fn test_should_fail_fast_on_503_without_retry() {
        let server =
            MockServer::start(vec![Canned::new(503, "busy"), Canned::new(200, "")]).await;
        let conn = Connection::new(server.config()).expect("connection");

        let err = conn
            .delete("/admin/orders/1.xml")
            .await
            .expect_err("503 should fail");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.body(), Some("busy"));
        assert_eq!(server.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_should_retry_503_after_retry_after() {
        let server = MockServer::start(vec![
            Canned::new(503, "busy").header("Retry-After", "0"),
            Canned::new(200, "<ok/>"),
        ])
        .await;
        let mut config = server.config();
        config.retry_on_503 = true;
        let conn = Connection::new(config).expect("connection");

        let body = conn
            .get("/admin/account.xml", &Query::new())
            .await
            .expect("retry should succeed");
        assert_eq!(body.as_ref(), b"<ok/>");
        assert_eq!(server.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_should_fall_back_to_retry_timeout() {
        let server =
            MockServer::start(vec![Canned::new(503, "busy"), Canned::new(200, "")]).await;
        let mut config = server.config();
        config.retry_on_503 = true;
        config.retry_timeout = Duration::from_millis(10);
        let conn = Connection::new(config).expect("connection");

        let started = Instant::now();
        conn.get("/admin/account.xml", &Query::new())
            .await
            .expect("retry should succeed");
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(server.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_should_return_api_error_with_body() {
        let server = MockServer::start(vec![Canned::new(
            422,
            "<errors><error>Title is blank</error></errors>",
        )])
        .await;
        let conn = Connection::new(server.config()).expect("connection");

        let err = conn
            .put("/admin/pages/1.xml", "<page/>")
            .await
            .expect_err("422 should fail");
        match err {
            ConnectionError::Api {
                method,
                path,
                status,
                body,
            } => {
                assert_eq!(method, "PUT");
                assert_eq!(path, "/admin/pages/1.xml");
                assert_eq!(status, 422);
                assert!(body.contains("Title is blank"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_extend_retry_after_from_usage_header() {
        let server =
            MockServer::start(vec![Canned::new(200, "").header("API-Usage-Limit", "95/100")])
                .await;
        let mut config = server.config();
        config.throttle = Throttle::Default;
        let conn = Connection::new(config).expect("connection");

        conn.get("/admin/products.xml", &Query::new())
            .await
            .expect("request");

        let state = conn.throttle_state();
        assert!(state.retry_after() > state.last_request() + Duration::from_secs(3));
        assert!(state.retry_after() <= state.last_request() + state.max_wait());
    }

    #[tokio::test]
    async fn test_should_ignore_usage_header_when_throttle_disabled() {
        let server =
            MockServer::start(vec![Canned::new(200, "").header("API-Usage-Limit", "100/100")])
                .await;
        let conn = Connection::new(server.config()).expect("connection");
        let before = conn.throttle_state().retry_after();

        conn.get("/admin/products.xml", &Query::new())
            .await
            .expect("request");
        assert_eq!(conn.throttle_state().retry_after(), before);
    }

    #[tokio::test]
    async fn test_should_ignore_malformed_usage_header() {
        let server =
            MockServer::start(vec![Canned::new(200, "").header("API-Usage-Limit", "lots")])
                .await;
        let mut config = server.config();
        config.throttle = Throttle::Default;
        let conn = Connection::new(config).expect("connection");
        let before = conn.throttle_state().retry_after();

        conn.get("/admin/products.xml", &Query::new())
            .await
            .expect("request");
        assert_eq!(conn.throttle_state().retry_after(), before);
    }

    #[tokio::test]
    async fn test_should_share_throttle_state_between_connections() {
        let server =
            MockServer::start(vec![Canned::new(200, "").header("API-Usage-Limit", "95/100")])
                .await;
        let shared = Arc::new(ThrottleState::default());
        let mut config = server.config();
        config.throttle = Throttle::Default;
        let first = Connection::with_throttle_state(config.clone(), Arc::clone(&shared))
            .expect("connection");
        let second =
            Connection::with_throttle_state(config, Arc::clone(&shared)).expect("connection");

        first
            .get("/admin/products.xml", &Query::new())
            .await
            .expect("request");
        let state = second.throttle_state();
        assert!(state.retry_after() > state.last_request());
    }

    #[tokio::test]
    async fn test_should_surface_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let config = ConnectionConfig::builder()
            .account("myshop")
            .api_key("key")
            .password("secret")
            .endpoint(format!("http://{addr}"))
            .build();
        let conn = Connection::new(config).expect("connection");

        let err = conn
            .get("/admin/account.xml", &Query::new())
            .await
            .expect_err("nothing listens");
        assert!(matches!(err, ConnectionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_should_retry_after_dropped_connection() {
        let server =
            MockServer::with_faults(vec![Fault::Hangup], vec![Canned::new(200, "<ok/>")]).await;
        let conn = Connection::new(retrying_socket_errors(server.config())).expect("connection");

        let body = conn
            .get("/admin/account.xml", &Query::new())
            .await
            .expect("retry should succeed");
        assert_eq!(body.as_ref(), b"<ok/>");
        assert_eq!(server.accepted(), 2);
        assert_eq!(server.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_should_retry_after_truncated_body() {
        let server = MockServer::with_faults(
            vec![Fault::TruncatedBody],
            vec![Canned::new(200, "<ok/>")],
        )
        .await;
        let conn = Connection::new(retrying_socket_errors(server.config())).expect("connection");

        let body = conn
            .get("/admin/account.xml", &Query::new())
            .await
            .expect("retry should succeed");
        assert_eq!(body.as_ref(), b"<ok/>");
        assert_eq!(server.accepted(), 2);
    }

    #[tokio::test]
    async fn test_should_surface_truncated_body_without_retry() {
        let server = MockServer::with_faults(
            vec![Fault::TruncatedBody],
            vec![Canned::new(200, "<ok/>")],
        )
        .await;
        let conn = Connection::new(server.config()).expect("connection");

        let err = conn
            .get("/admin/account.xml", &Query::new())
            .await
            .expect_err("body is incomplete");
        assert!(matches!(err, ConnectionError::Transport(ref e) if e.is_body()));
        assert_eq!(server.accepted(), 1);
    }

    #[tokio::test]
    async fn test_should_not_retry_invalid_url() {
        let config = ConnectionConfig::builder()
            .account("myshop")
            .api_key("key")
            .password("secret")
            .endpoint("http://[::1")
            .build();
        let conn = Connection::new(retrying_socket_errors(config)).expect("connection");

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            conn.get("/admin/account.xml", &Query::new()),
        )
        .await
        .expect("invalid URL should fail without retrying");
        assert!(matches!(result, Err(ConnectionError::Transport(ref e)) if e.is_builder()));
    }

    #[test]
    fn test_should_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(1500)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_should_hide_credentials_in_debug() {
        let config = ConnectionConfig::builder()
            .account("myshop")
            .api_key("key")
            .password("secret")
            .build();
        let conn = Connection::new(config).expect("connection");
        let debug = format!("{conn:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("a2V5OnNlY3JldA=="));
        assert_eq!(conn.base_url(), "http://myshop.myinsales.ru");
    }
}
