pub mod request;

use serde::{Deserialize, Serialize};

/// `object` value of every chunk this bridge emits.
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// One streamed delta record as sent by the upstream provider.
///
/// Every field is optional: providers omit identity fields on later chunks
/// and send a bare `usage` chunk at the end of the stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    /// Kept as sent; providers disagree on the number type.
    #[serde(default)]
    pub created: Option<serde_json::Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<UpstreamChoice>>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

impl UpstreamChunk {
    /// Take the only choice the bridge consults; `n > 1` is not supported.
    #[must_use]
    pub fn take_first_choice(&mut self) -> Option<UpstreamChoice> {
        self.choices.take().and_then(|choices| choices.into_iter().next())
    }
}

/// A choice within an upstream chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default)]
    pub delta: Option<UpstreamDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within an upstream choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    /// LongCat-specific deliberation channel.
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

/// Token usage, passed through verbatim including provider extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The single synthetic chunk sent downstream.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiStreamChunk {
    pub id: String,
    pub object: &'static str,
    pub created: Option<serde_json::Value>,
    pub model: String,
    pub choices: Vec<OpenAiStreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

/// A choice within the synthetic chunk.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiStreamChoice {
    pub index: u32,
    pub delta: OpenAiDelta,
    pub finish_reason: String,
}

/// Delta content within the synthetic choice.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiDelta {
    pub content: String,
}
