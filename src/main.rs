//! # dispatch
//!
//! Entry point. `serve` runs the HTTP API and the dispatcher on one shared
//! in-memory broker; every other command is a client of a running service.
//!
//! ## Shutdown
//!
//! SIGTERM/SIGINT stop polling for new messages. Evaluations already started
//! still publish their actions before the process exits.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dispatch::cli::Cli;
use dispatch::commands::execute_command;

const DEFAULT_FILTER: &str = "info,dispatch=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    execute_command(Cli::parse()).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
