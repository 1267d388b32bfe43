use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::web::AppState;

/// Liveness plus a summary of what is cached
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.directory.current();
    let guide = state.guide.as_ref().map(|store| store.current());

    Json(json!({
        "status": "ok",
        "channels": snapshot.len(),
        "channels_refreshed_at": snapshot.refreshed_at,
        "programmes": guide.as_ref().map(|g| g.program_count()),
        "guide_refreshed_at": guide.as_ref().and_then(|g| g.refreshed_at),
    }))
}
