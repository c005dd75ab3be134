use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::TransitError;
use crate::middleware::RequireKeyAuth;
use crate::router::{TransitState, ok_envelope};
use crate::types::ConductorInput;

pub async fn list(State(state): State<TransitState>) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.registry.list_conductors().await?))
}

pub async fn create(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Json(input): Json<ConductorInput>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.registry.create_conductor(input).await?))
}
