use std::time::{Duration, Instant};

use tracing::info;

use crate::protocol::openai_chat::OpenAiUsage;

/// Latency and throughput figures for one aggregated request.
///
/// Observability only; none of this reaches the client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStats {
    pub elapsed: Duration,
    /// Zero when no chunk ever arrived.
    pub time_to_first_token: Duration,
    pub output_tokens: u64,
    pub tokens_per_second: f64,
}

impl StreamStats {
    #[must_use]
    pub fn compute(
        started_at: Instant,
        first_token_at: Option<Instant>,
        finished_at: Instant,
        usage: Option<&OpenAiUsage>,
        content: &str,
    ) -> Self {
        let elapsed = finished_at.saturating_duration_since(started_at);
        let time_to_first_token =
            first_token_at.map_or(Duration::ZERO, |t| t.saturating_duration_since(started_at));
        let output_tokens = usage
            .and_then(|usage| usage.completion_tokens)
            .unwrap_or_else(|| estimate_output_tokens(content));
        Self {
            elapsed,
            time_to_first_token,
            output_tokens,
            tokens_per_second: tokens_per_second(output_tokens, elapsed),
        }
    }
}

/// Fallback output token estimate: whitespace-delimited words.
#[must_use]
pub fn estimate_output_tokens(content: &str) -> u64 {
    content.split_whitespace().count() as u64
}

#[must_use]
pub fn tokens_per_second(output_tokens: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    output_tokens as f64 / secs
}

/// Log the completion line for a request at INFO level.
pub fn log_request_stats(request_seq: u64, model: &str, finish_reason: &str, stats: &StreamStats) {
    info!(
        request_seq,
        model,
        finish_reason,
        output_tokens = stats.output_tokens,
        elapsed_seconds = stats.elapsed.as_secs_f64(),
        ttft_seconds = stats.time_to_first_token.as_secs_f64(),
        tokens_per_second = stats.tokens_per_second,
        "request completed"
    );
}
