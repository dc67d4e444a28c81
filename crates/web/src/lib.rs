//! HTTP API for dispatch.
//!
//! Rule and requirement-set registration, registry inspection, and topic
//! publish/poll endpoints, served by axum with tower middleware for tracing
//! and CORS.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{AppError, ErrorResponse};
pub use server::{Error, create_app, run_server, serve};
pub use state::AppState;
