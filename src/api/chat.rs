use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::protocol::openai_chat::request::build_upstream_body;
use crate::proxy::aggregate_stream;
use crate::state::AppState;

/// `POST /v1/chat/completions`.
///
/// The request body is rewritten for the upstream before any network call;
/// a body that is not a JSON object is rejected with 400. Everything after
/// that is reported inside the SSE stream.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    let upstream_body = match build_upstream_body(&body, &state.config.upstream) {
        Ok(upstream_body) => upstream_body,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting chat request");
            return err.into_response();
        }
    };

    sse_ok_response(Body::from_stream(aggregate_stream(state, upstream_body)))
}

#[inline]
fn sse_ok_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
