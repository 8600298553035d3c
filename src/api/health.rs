use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary. The API key is never echoed.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "longcat-bridge is running",
        "config": {
            "upstream": state.upstream.chat_url().as_str(),
            "model": config.upstream.model,
            "max_tokens": config.upstream.max_tokens,
            "timeout": config.server.timeout,
            "features": {
                "show_reasoning": config.features.show_reasoning,
                "done_delay_ms": config.features.done_delay_ms,
                "log_level": config.features.log_level,
            }
        }
    }))
}
