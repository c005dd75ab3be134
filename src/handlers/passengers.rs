use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::TransitError;
use crate::middleware::RequireKeyAuth;
use crate::router::{TransitState, ok_envelope};
use crate::service::import_passengers_csv;
use crate::types::PassengerInput;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

fn require_id(query: IdQuery) -> Result<String, TransitError> {
    query
        .id
        .ok_or_else(|| TransitError::Validation("missing required query parameter: id".to_string()))
}

/// GET /passengers: the whole collection, or one record with `?id=`.
pub async fn list_or_get(
    State(state): State<TransitState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, TransitError> {
    match query.id {
        Some(id) => Ok(ok_envelope(state.registry.get_passenger(&id).await?)),
        None => Ok(ok_envelope(state.registry.list_passengers().await?)),
    }
}

pub async fn create(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Json(input): Json<PassengerInput>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(state.registry.create_passenger(input).await?))
}

pub async fn update(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Query(query): Query<IdQuery>,
    Json(input): Json<PassengerInput>,
) -> Result<Json<Value>, TransitError> {
    let id = require_id(query)?;
    Ok(ok_envelope(
        state.registry.update_passenger(&id, input).await?,
    ))
}

/// Local-only delete; remote mirrors are untouched.
pub async fn remove(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, TransitError> {
    let id = require_id(query)?;
    state.registry.delete_passenger(&id).await?;
    Ok(ok_envelope(serde_json::json!({ "deleted": id })))
}

/// POST /passengers/import: CSV body, idempotent on re-import.
pub async fn import(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    body: String,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(
        import_passengers_csv(&state.registry, &body).await?,
    ))
}
