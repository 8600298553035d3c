use crate::error::ProxyError;
use crate::protocol::openai_chat::{
    OpenAiDelta, OpenAiStreamChoice, OpenAiStreamChunk, CHUNK_OBJECT,
};

use super::aggregate::CompletedResponse;
use super::sse::{done_frame, openai_sse_frame};

const REASONING_OPEN: &str = "<details><summary>Reasoning</summary>\n\n";
const REASONING_CLOSE: &str = "\n\n</details>\n\n";

/// Compose the text delivered to the client.
///
/// With `show_reasoning` and non-empty reasoning, the reasoning is
/// prepended as a collapsible `<details>` block.
#[must_use]
pub fn compose_content(content: &str, reasoning: &str, show_reasoning: bool) -> String {
    if !show_reasoning || reasoning.is_empty() {
        return content.to_owned();
    }
    let mut out = String::with_capacity(
        REASONING_OPEN.len() + reasoning.len() + REASONING_CLOSE.len() + content.len(),
    );
    out.push_str(REASONING_OPEN);
    out.push_str(reasoning);
    out.push_str(REASONING_CLOSE);
    out.push_str(content);
    out
}

/// Build the single chunk that stands in for the whole upstream stream.
#[must_use]
pub fn build_synthetic_chunk(
    response: &CompletedResponse,
    show_reasoning: bool,
    default_model: &str,
) -> OpenAiStreamChunk {
    OpenAiStreamChunk {
        id: response.id.clone(),
        object: CHUNK_OBJECT,
        created: response.created.clone(),
        model: response
            .model
            .clone()
            .unwrap_or_else(|| default_model.to_owned()),
        choices: vec![OpenAiStreamChoice {
            index: 0,
            delta: OpenAiDelta {
                content: compose_content(&response.content, &response.reasoning, show_reasoning),
            },
            finish_reason: response.finish_reason.clone(),
        }],
        usage: response.usage.clone(),
    }
}

/// Encode the outbound stream for a completed response: the synthetic
/// chunk frame followed by the `[DONE]` frame.
///
/// # Errors
///
/// Returns [`ProxyError::Internal`] if the chunk cannot be serialized.
pub fn assemble_frames(
    response: &CompletedResponse,
    show_reasoning: bool,
    default_model: &str,
) -> Result<[String; 2], ProxyError> {
    let chunk = build_synthetic_chunk(response, show_reasoning, default_model);
    let json = serde_json::to_string(&chunk)
        .map_err(|e| ProxyError::Internal(format!("Failed to encode synthetic chunk: {e}")))?;
    Ok([openai_sse_frame(&json), done_frame()])
}
