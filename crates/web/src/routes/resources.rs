//! Registry endpoints: GET /resources, GET /resources/{id}

use axum::{
    extract::{Path, State},
    response::Json,
};

use dispatch_core::Error;
use dispatch_events::Resource;

use crate::error::Result;
use crate::state::AppState;

pub async fn list_resources(State(state): State<AppState>) -> Json<Vec<Resource>> {
    Json(state.engine.resources().await)
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Resource>> {
    let resource = state.engine.fleet().await.registry.get(&id).cloned();
    resource
        .map(Json)
        .ok_or_else(|| Error::unknown_resource(id).into())
}
