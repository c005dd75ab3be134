use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::TransitError;
use crate::middleware::RequireKeyAuth;
use crate::router::{TransitState, ok_envelope};

/// POST /sync/pull: overwrite the local passenger collection with the
/// remote snapshot.
pub async fn pull(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.sync.pull().await?))
}

/// POST /sync/push: mirror the local collection to the remote sheet,
/// best-effort per record.
pub async fn push(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.sync.push().await?))
}

#[derive(Debug, Deserialize)]
pub struct TokenInput {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Inject a spreadsheet access token obtained out of band.
pub async fn set_token(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Json(input): Json<TokenInput>,
) -> Result<Json<Value>, TransitError> {
    state
        .sheets
        .set_access_token(input.access_token, input.expires_in)
        .await;
    Ok(ok_envelope(json!({ "authenticated": true })))
}

pub async fn clear_token(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
) -> Result<Json<Value>, TransitError> {
    state.sheets.clear_access_token().await;
    Ok(ok_envelope(json!({ "authenticated": false })))
}
