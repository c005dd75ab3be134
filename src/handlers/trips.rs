use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::TransitError;
use crate::middleware::RequireKeyAuth;
use crate::router::{TransitState, ok_envelope};
use crate::types::{FinishTripInput, StartTripInput};

pub async fn list(State(state): State<TransitState>) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.registry.list_trips().await?))
}

pub async fn start(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Json(input): Json<StartTripInput>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.registry.start_trip(input).await?))
}

pub async fn finish(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Json(input): Json<FinishTripInput>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.registry.finish_trip(&input.trip_id).await?))
}
