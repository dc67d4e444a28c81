//! Reaction rule endpoints: /reaction-model

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use dispatch_engine::ReactionRule;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReactionResponse {
    reaction_id: String,
    replaced: bool,
}

/// POST /reaction-model
///
/// The document is decoded into the tagged rule model and validated before
/// it is stored. A rule with an existing `reactionId` is replaced.
pub async fn register_reaction(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ReactionRule>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterReactionResponse>)> {
    let Json(rule) = payload?;
    let reaction_id = rule.reaction_id.clone();
    let replaced = state.engine.register_rule(rule).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterReactionResponse {
            reaction_id,
            replaced,
        }),
    ))
}

/// GET /reaction-model
pub async fn list_reactions(State(state): State<AppState>) -> Json<Vec<ReactionRule>> {
    Json(state.engine.rules().await)
}

/// DELETE /reaction-model/{id}
pub async fn delete_reaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state
        .engine
        .remove_rule(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| AppError::NotFound(format!("reaction '{id}'")))
}
