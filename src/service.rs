//! Wiring for `dispatch serve`: one broker shared by the HTTP API and the
//! dispatcher, one engine state, one shutdown coordinator.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use dispatch_core::DispatchConfig;
use dispatch_engine::{
    DispatchStats, Dispatcher, DispatcherConfig, SharedState, ShutdownCoordinator, ShutdownSignal,
};
use dispatch_events::{InMemoryBroker, TracingTransport};
use dispatch_web::AppState;

/// Serve on `listener` until `shutdown` is initiated.
///
/// A dispatcher failure also stops the HTTP API.
///
/// # Errors
///
/// Returns the dispatcher's error when the transport fails, or the server's
/// when it stops accepting connections.
pub async fn serve(
    config: DispatchConfig,
    listener: TcpListener,
    shutdown: Arc<ShutdownCoordinator>,
) -> Result<DispatchStats> {
    let transport = Arc::new(TracingTransport::new(InMemoryBroker::with_max_batch(
        config.broker.max_batch,
    )));
    let engine = SharedState::new();

    let dispatcher = Dispatcher::new(
        Arc::clone(&transport),
        engine.clone(),
        DispatcherConfig::from(&config),
        Arc::clone(&shutdown),
    );
    let dispatcher = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            let result = dispatcher.run().await;
            if let Err(e) = &result {
                error!(error = %e, "Dispatcher failed, stopping service");
            }
            shutdown.initiate_shutdown(ShutdownSignal::Programmatic).await;
            result
        })
    };

    let state = AppState::new(engine, transport, config.broker.clone());
    let server_shutdown = {
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown.wait().await }
    };
    let served = dispatch_web::serve(listener, state, server_shutdown).await;
    shutdown.initiate_shutdown(ShutdownSignal::Programmatic).await;

    let stats = dispatcher
        .await
        .context("Dispatcher task did not finish")?
        .context("Dispatcher stopped with an error")?;
    served.context("HTTP API stopped with an error")?;

    info!(?stats, "Service stopped");
    Ok(stats)
}
