use std::sync::OnceLock;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::ProxyError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    timeout: Duration,
) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|err| ProxyError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// HTTP transport client for the upstream provider.
///
/// The `reqwest` client is pooled and shared by all requests. Its timeout
/// bounds each request end to end, body streaming included.
pub struct HttpTransport {
    client: OnceLock<reqwest::Client>,
    pool_max_idle_per_host: usize,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with pooling and timeout from the server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            client: OnceLock::new(),
            pool_max_idle_per_host: config.http_pool_max_idle_per_host.max(1),
            timeout: Duration::from_secs(config.timeout),
        }
    }

    /// Overall per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| {
            build_reqwest_client(self.pool_max_idle_per_host, self.timeout).unwrap_or_else(
                |err| {
                    tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                    reqwest::Client::new()
                },
            )
        })
    }

    /// Send a streaming POST and return the response for body reading.
    ///
    /// Non-success statuses are returned as `Ok`; the caller decides how to
    /// surface them.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when the connection fails or the
    /// timeout elapses before response headers arrive.
    pub async fn send_stream(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut request = reqwest::Request::new(http::Method::POST, url.clone());
        *request.headers_mut() = headers.clone();
        *request.body_mut() = Some(reqwest::Body::from(body));

        self.client()
            .execute(request)
            .await
            .map_err(|err| ProxyError::Transport(describe_transport_error(&err)))
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Upstream request timed out: {err}")
    } else if err.is_connect() {
        format!("Failed to connect to upstream: {err}")
    } else {
        format!("Upstream request failed: {err}")
    }
}
