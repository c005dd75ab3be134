use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::TransitError;
use crate::router::TransitState;

pub async fn health(State(state): State<TransitState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "has_database_url": state.has_database_url,
    }))
}

/// Round-trip through the secondary store to prove it is reachable.
pub async fn db_check(State(state): State<TransitState>) -> Result<Json<Value>, TransitError> {
    let now: (String,) = sqlx::query_as("SELECT datetime('now')")
        .fetch_one(state.db.pool())
        .await?;
    Ok(Json(json!({ "ok": true, "now": now.0 })))
}
