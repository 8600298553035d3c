//! Request orchestration: upstream call, aggregation, and the outbound
//! frame sequence.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::observability::stats::log_request_stats;
use crate::state::AppState;
use crate::stream::sse::{done_frame, error_frame};
use crate::stream::{
    assemble_frames, decode_chunk, sse_line_stream, CompletedResponse, SseLine, StreamAggregator,
};

/// Result of driving one upstream request to completion.
#[derive(Debug)]
pub enum UpstreamOutcome {
    /// The upstream could not be reached, answered with a non-success
    /// status, or broke off mid-stream.
    Failed(ProxyError),
    /// The stream ended without a single chunk carrying an id.
    Empty,
    Complete(CompletedResponse),
}

/// One SSE frame of the outbound body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub text: String,
    /// Pause before this frame is written.
    pub delay_before: Duration,
}

impl OutboundFrame {
    fn immediate(text: String) -> Self {
        Self {
            text,
            delay_before: Duration::ZERO,
        }
    }
}

/// Send the upstream request and fold its whole SSE body.
///
/// A body that fails before a normal end of stream is reported as
/// [`UpstreamOutcome::Failed`]; partial content is discarded.
pub async fn collect_upstream(state: &AppState, body: Bytes, request_seq: u64) -> UpstreamOutcome {
    let upstream = &state.upstream;
    let response = match state
        .transport
        .send_stream(upstream.chat_url(), upstream.static_headers(), body)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!(request_seq, error = %err, "upstream request failed");
            return UpstreamOutcome::Failed(err);
        }
    };

    let status = response.status();
    if !status.is_success() {
        let message = match response.text().await {
            Ok(text) => text,
            Err(err) => format!("Failed to read upstream error body: {err}"),
        };
        warn!(request_seq, status = status.as_u16(), "upstream returned error status");
        return UpstreamOutcome::Failed(ProxyError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    let mut aggregator = StreamAggregator::new();
    let mut lines = std::pin::pin!(sse_line_stream(response.bytes_stream()));
    let mut malformed = 0u64;
    while let Some(line) = lines.next().await {
        match line {
            Ok(SseLine::Payload(payload)) => match decode_chunk(&payload) {
                Ok(chunk) => aggregator.push(chunk),
                Err(err) => {
                    malformed += 1;
                    debug!(request_seq, error = %err, "skipping malformed upstream chunk");
                }
            },
            Ok(SseLine::Done) => break,
            Err(err) => {
                warn!(
                    request_seq,
                    chunks = aggregator.chunk_count(),
                    discarded_bytes = aggregator.state().content.len(),
                    error = %err,
                    "upstream body failed before the stream ended"
                );
                let message = if err.is_timeout() {
                    format!(
                        "Upstream stream timed out after {}s",
                        state.transport.timeout().as_secs()
                    )
                } else {
                    format!("Upstream stream interrupted: {err}")
                };
                return UpstreamOutcome::Failed(ProxyError::Transport(message));
            }
        }
    }

    let chunks = aggregator.chunk_count();
    match aggregator.finish() {
        Some(completed) => UpstreamOutcome::Complete(completed),
        None => {
            warn!(request_seq, chunks, malformed, "upstream produced no valid response");
            UpstreamOutcome::Empty
        }
    }
}

/// Map an outcome to the frames written downstream. Every sequence ends
/// with the `[DONE]` frame.
#[must_use]
pub fn outcome_frames(
    outcome: UpstreamOutcome,
    config: &AppConfig,
    request_seq: u64,
) -> Vec<OutboundFrame> {
    match outcome {
        UpstreamOutcome::Failed(err) => vec![
            OutboundFrame::immediate(error_frame(&err.stream_message())),
            OutboundFrame::immediate(done_frame()),
        ],
        UpstreamOutcome::Empty => vec![OutboundFrame::immediate(done_frame())],
        UpstreamOutcome::Complete(completed) => {
            let model = completed
                .model
                .as_deref()
                .unwrap_or(config.upstream.model.as_str());
            log_request_stats(request_seq, model, &completed.finish_reason, &completed.stats);
            match assemble_frames(
                &completed,
                config.features.show_reasoning,
                &config.upstream.model,
            ) {
                Ok([chunk, done]) => vec![
                    OutboundFrame::immediate(chunk),
                    OutboundFrame {
                        text: done,
                        delay_before: Duration::from_millis(config.features.done_delay_ms),
                    },
                ],
                Err(err) => {
                    warn!(request_seq, error = %err, "failed to assemble response");
                    vec![
                        OutboundFrame::immediate(error_frame(&err.stream_message())),
                        OutboundFrame::immediate(done_frame()),
                    ]
                }
            }
        }
    }
}

/// Build the outbound SSE body for one chat request.
///
/// Nothing happens until the stream is first polled. Dropping it at any
/// point drops the in-flight upstream response with it.
pub fn aggregate_stream(
    state: Arc<AppState>,
    body: Bytes,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let request_seq = state.next_request_seq();
    debug!(request_seq, bytes = body.len(), "forwarding chat request");

    futures_util::stream::once(async move {
        let outcome = collect_upstream(&state, body, request_seq).await;
        futures_util::stream::iter(outcome_frames(outcome, &state.config, request_seq))
    })
    .flatten()
    .then(|frame| async move {
        if !frame.delay_before.is_zero() {
            tokio::time::sleep(frame.delay_before).await;
        }
        Ok::<_, Infallible>(Bytes::from(frame.text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::stats::StreamStats;

    fn config(delay_ms: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.features.done_delay_ms = delay_ms;
        config
    }

    fn completed() -> CompletedResponse {
        CompletedResponse {
            id: "x1".into(),
            created: None,
            model: None,
            content: "Hello".into(),
            reasoning: String::new(),
            finish_reason: "stop".into(),
            usage: None,
            stats: StreamStats {
                elapsed: Duration::from_millis(5),
                time_to_first_token: Duration::from_millis(1),
                output_tokens: 1,
                tokens_per_second: 200.0,
            },
        }
    }

    #[test]
    fn test_failed_outcome_is_error_then_done() {
        let frames = outcome_frames(
            UpstreamOutcome::Failed(ProxyError::Upstream {
                status: 500,
                message: "boom".into(),
            }),
            &config(100),
            1,
        );
        let texts: Vec<&str> = frames.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["data: {\"error\": \"boom\"}\n\n", "data: [DONE]\n\n"]);
        assert!(frames.iter().all(|f| f.delay_before.is_zero()));
    }

    #[test]
    fn test_empty_outcome_is_done_only() {
        let frames = outcome_frames(UpstreamOutcome::Empty, &config(100), 1);
        assert_eq!(frames, vec![OutboundFrame::immediate(done_frame())]);
    }

    #[test]
    fn test_complete_outcome_delays_done() {
        let frames = outcome_frames(UpstreamOutcome::Complete(completed()), &config(100), 1);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].text.contains("\"content\":\"Hello\""));
        assert!(frames[0].text.contains("\"model\":\"longcat-flash-thinking\""));
        assert_eq!(frames[0].delay_before, Duration::ZERO);
        assert_eq!(frames[1].text, "data: [DONE]\n\n");
        assert_eq!(frames[1].delay_before, Duration::from_millis(100));
    }

    #[test]
    fn test_zero_delay_disables_pause() {
        let frames = outcome_frames(UpstreamOutcome::Complete(completed()), &config(0), 1);
        assert!(frames[1].delay_before.is_zero());
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_reports_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = config(0);
        config.upstream.api_key = "sk-test".into();
        config.upstream.base_url = format!("http://{addr}");
        let state = Arc::new(AppState::new(config).unwrap());

        let stream = aggregate_stream(Arc::clone(&state), Bytes::from_static(b"{}"));
        let frames: Vec<Bytes> = stream.map(|frame| frame.unwrap()).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with(b"data: {\"error\": "));
        assert_eq!(&frames[1][..], b"data: [DONE]\n\n");
    }
}
