use crate::protocol::openai_chat::UpstreamChunk;

/// Decode one candidate payload into an [`UpstreamChunk`].
///
/// Callers treat an `Err` as a malformed chunk to skip; it never aborts
/// the stream.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`] when the payload is not a
/// JSON object of the expected shape.
pub fn decode_chunk(payload: &str) -> Result<UpstreamChunk, serde_json::Error> {
    serde_json::from_str(payload)
}
