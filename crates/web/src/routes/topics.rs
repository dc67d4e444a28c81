//! Topic endpoints: /topics/{topic}/messages
//!
//! Lets HTTP clients act as producers and consumers on the broker the
//! dispatcher reads from.

use axum::{
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use dispatch_events::Envelope;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    key: String,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    timeout_ms: Option<u64>,
}

/// POST /topics/{topic}/messages
pub async fn publish_message(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    payload: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishResponse>)> {
    let Json(payload) = payload?;
    let key = state.transport.send(&topic, payload).await?;
    debug!(topic = %topic, key = %key, "Published over HTTP");

    Ok((StatusCode::ACCEPTED, Json(PublishResponse { key })))
}

/// GET /topics/{topic}/messages?timeout_ms=N
///
/// Returns pending envelopes, or an empty list once the wait runs out.
pub async fn poll_messages(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    query: std::result::Result<Query<PollQuery>, QueryRejection>,
) -> Result<Json<Vec<Envelope>>> {
    let Query(query) = query?;
    let wait = state.poll_wait(query.timeout_ms);
    let batch = state.transport.poll(&topic, wait).await?;

    Ok(Json(batch))
}
