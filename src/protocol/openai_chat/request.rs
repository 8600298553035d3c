use serde_json::{Map, Value};

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Build the upstream request body from the client's JSON.
///
/// All client fields pass through except `model`, `stream` and
/// `max_tokens`, which are always overwritten from configuration.
///
/// # Errors
///
/// Returns [`ProxyError::InvalidRequest`] when the body is not valid JSON
/// or not a JSON object.
pub fn build_upstream_body(
    client_body: &[u8],
    upstream: &UpstreamConfig,
) -> Result<bytes::Bytes, ProxyError> {
    let value: Value = serde_json::from_slice(client_body)
        .map_err(|e| ProxyError::InvalidRequest(format!("Malformed JSON body: {e}")))?;
    let Value::Object(mut map) = value else {
        return Err(ProxyError::InvalidRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };
    apply_overrides(&mut map, upstream);
    serde_json::to_vec(&map)
        .map(bytes::Bytes::from)
        .map_err(|e| ProxyError::Internal(format!("Failed to encode upstream body: {e}")))
}

fn apply_overrides(map: &mut Map<String, Value>, upstream: &UpstreamConfig) {
    map.insert("model".to_string(), Value::String(upstream.model.clone()));
    map.insert("stream".to_string(), Value::Bool(true));
    map.insert("max_tokens".to_string(), Value::from(upstream.max_tokens));
}
