use crate::config::UpstreamConfig;
use crate::error::ProxyError;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Upstream endpoint and headers computed once at startup.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    chat_url: url::Url,
    static_headers: http::HeaderMap,
}

impl PreparedUpstream {
    /// Build the prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] when the base URL does not parse or the
    /// API key cannot be carried in an HTTP header.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, ProxyError> {
        let base = upstream.base_url.trim_end_matches('/');
        let chat_url = url::Url::parse(&format!("{base}{CHAT_COMPLETIONS_PATH}"))
            .map_err(|e| ProxyError::Config(format!("Invalid upstream URL: {e}")))?;
        Ok(Self {
            chat_url,
            static_headers: Self::build_headers(&upstream.api_key)?,
        })
    }

    #[must_use]
    pub fn chat_url(&self) -> &url::Url {
        &self.chat_url
    }

    #[must_use]
    pub fn static_headers(&self) -> &http::HeaderMap {
        &self.static_headers
    }

    fn build_headers(api_key: &str) -> Result<http::HeaderMap, ProxyError> {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("text/event-stream"),
        );
        let mut auth = http::HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| {
                ProxyError::Config("API key contains characters not allowed in a header".into())
            })?;
        auth.set_sensitive(true);
        headers.insert(http::header::AUTHORIZATION, auth);
        Ok(headers)
    }
}
