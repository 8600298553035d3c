use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::transport::{HttpTransport, PreparedUpstream};

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub upstream: PreparedUpstream,
    request_seq: AtomicU64,
}

impl AppState {
    /// Build state from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] when the upstream URL or API key cannot
    /// be turned into a request target.
    pub fn new(config: AppConfig) -> Result<Self, ProxyError> {
        let upstream = PreparedUpstream::new(&config.upstream)?;
        let transport = HttpTransport::new(&config.server);
        tracing::debug!(
            upstream = %upstream.chat_url(),
            model = %config.upstream.model,
            "application state initialized"
        );
        Ok(Self {
            config,
            transport,
            upstream,
            request_seq: AtomicU64::new(0),
        })
    }

    /// Next request sequence number, used only to correlate log lines.
    #[inline]
    pub fn next_request_seq(&self) -> u64 {
        self.request_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}
