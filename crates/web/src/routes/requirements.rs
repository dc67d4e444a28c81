//! Requirement set endpoints: /requirements-model

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use dispatch_core::Error;
use dispatch_engine::{MatchOutcome, RequirementSet, SetView};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterRequirementsResponse {
    id: String,
    replaced: bool,
    outcome: MatchOutcome,
}

/// POST /requirements-model
///
/// Stores the set and evaluates it immediately. An unsatisfied set is still
/// registered; the response carries the unsatisfied requirement.
pub async fn register_requirements(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RequirementSet>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterRequirementsResponse>)> {
    let Json(set) = payload?;
    let id = set.id.clone();
    let (replaced, outcome) = state.engine.upsert_requirements(set).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterRequirementsResponse {
            id,
            replaced,
            outcome,
        }),
    ))
}

/// GET /requirements-model
pub async fn list_requirements(State(state): State<AppState>) -> Json<Vec<SetView>> {
    Json(state.engine.requirement_sets().await)
}

/// DELETE /requirements-model/{id}
pub async fn delete_requirements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    match state.engine.remove_requirements(&id).await {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(Error::unknown_requirement_set(id).into()),
    }
}
