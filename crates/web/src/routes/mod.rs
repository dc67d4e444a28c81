//! REST API routes
//!
//! ## Route Structure
//!
//! - `GET /health` - Health check
//! - `POST /reaction-model` - Register or replace a reaction rule
//! - `GET /reaction-model` - List rules in id order
//! - `DELETE /reaction-model/{id}` - Remove a rule
//! - `POST /requirements-model` - Register or replace a requirement set and evaluate it
//! - `GET /requirements-model` - List sets, heaviest first, with status and allocation
//! - `DELETE /requirements-model/{id}` - Remove a set and release its allocation
//! - `GET /resources` - Registry snapshot
//! - `GET /resources/{id}` - One resource
//! - `POST /topics/{topic}/messages` - Publish a JSON message under a random key
//! - `GET /topics/{topic}/messages` - Bounded poll of pending envelopes

use axum::{
    Router,
    routing::{delete, get},
};

use crate::state::AppState;

pub mod health;
pub mod reactions;
pub mod requirements;
pub mod resources;
pub mod topics;

/// Create the API router. State is supplied by the caller.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/reaction-model",
            get(reactions::list_reactions).post(reactions::register_reaction),
        )
        .route("/reaction-model/{id}", delete(reactions::delete_reaction))
        .route(
            "/requirements-model",
            get(requirements::list_requirements).post(requirements::register_requirements),
        )
        .route(
            "/requirements-model/{id}",
            delete(requirements::delete_requirements),
        )
        .route("/resources", get(resources::list_resources))
        .route("/resources/{id}", get(resources::get_resource))
        .route(
            "/topics/{topic}/messages",
            get(topics::poll_messages).post(topics::publish_message),
        )
}
