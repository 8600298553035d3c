//! Folds upstream chunks into one logical response.
//!
//! Identity fields (`id`, `created`, `model`) are first-write-wins;
//! `finish_reason` and `usage` are last-write-wins. Content and reasoning
//! fragments from `choices[0]` are concatenated in arrival order.

use std::time::Instant;

use crate::observability::stats::StreamStats;
use crate::protocol::openai_chat::{OpenAiUsage, UpstreamChunk};

/// Finish reason reported when the upstream never supplies one.
pub const DEFAULT_FINISH_REASON: &str = "stop";

/// Accumulated state for one proxied request.
#[derive(Debug, Clone)]
pub struct AggregatedResponse {
    pub content: String,
    pub reasoning: String,
    pub id: Option<String>,
    pub created: Option<serde_json::Value>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<OpenAiUsage>,
    pub started_at: Instant,
    pub first_token_at: Option<Instant>,
}

/// A finalized, non-empty aggregation ready for assembly.
#[derive(Debug, Clone)]
pub struct CompletedResponse {
    pub id: String,
    pub created: Option<serde_json::Value>,
    pub model: Option<String>,
    pub content: String,
    pub reasoning: String,
    pub finish_reason: String,
    pub usage: Option<OpenAiUsage>,
    pub stats: StreamStats,
}

/// Request-scoped aggregation state machine.
#[derive(Debug)]
pub struct StreamAggregator {
    state: AggregatedResponse,
    chunks: u64,
}

impl StreamAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Start aggregating with an explicit request start instant.
    #[must_use]
    pub fn started_at(started_at: Instant) -> Self {
        Self {
            state: AggregatedResponse {
                content: String::new(),
                reasoning: String::new(),
                id: None,
                created: None,
                model: None,
                finish_reason: None,
                usage: None,
                started_at,
                first_token_at: None,
            },
            chunks: 0,
        }
    }

    /// Number of chunks folded so far.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Current accumulated state.
    #[must_use]
    pub fn state(&self) -> &AggregatedResponse {
        &self.state
    }

    /// Fold one decoded chunk.
    pub fn push(&mut self, mut chunk: UpstreamChunk) {
        let state = &mut self.state;
        if self.chunks == 0 {
            state.first_token_at = Some(Instant::now());
        }
        self.chunks += 1;

        let first_choice = chunk.take_first_choice();
        let UpstreamChunk {
            id,
            created,
            model,
            usage,
            ..
        } = chunk;

        if state.id.is_none() {
            if let Some(id) = id.filter(|id| !id.is_empty()) {
                state.id = Some(id);
                state.created = created;
                state.model = model.filter(|model| !model.is_empty());
            }
        }

        if let Some(choice) = first_choice {
            if let Some(delta) = choice.delta {
                if let Some(content) = delta.content {
                    state.content.push_str(&content);
                }
                if let Some(reasoning) = delta.reasoning_content {
                    state.reasoning.push_str(&reasoning);
                }
            }
            if let Some(reason) = choice.finish_reason.filter(|reason| !reason.is_empty()) {
                state.finish_reason = Some(reason);
            }
        }

        if let Some(usage) = usage {
            state.usage = Some(usage);
        }
    }

    /// Finalize the aggregation.
    ///
    /// Returns `None` when no chunk ever supplied an id: the upstream
    /// produced no valid response.
    #[must_use]
    pub fn finish(self) -> Option<CompletedResponse> {
        self.finish_at(Instant::now())
    }

    /// Finalize using an explicit end instant.
    #[must_use]
    pub fn finish_at(self, finished_at: Instant) -> Option<CompletedResponse> {
        let state = self.state;
        let id = state.id?;
        let stats = StreamStats::compute(
            state.started_at,
            state.first_token_at,
            finished_at,
            state.usage.as_ref(),
            &state.content,
        );
        Some(CompletedResponse {
            id,
            created: state.created,
            model: state.model,
            content: state.content,
            reasoning: state.reasoning,
            finish_reason: state
                .finish_reason
                .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
            usage: state.usage,
            stats,
        })
    }
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}
