use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// List the single configured model in `OpenAI` format.
pub fn handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{
            "id": state.config.upstream.model,
            "object": "model",
            "owned_by": "longcat",
        }]
    }))
}
