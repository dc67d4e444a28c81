//! CLI command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use dispatch_core::DispatchConfig;
use dispatch_engine::{ShutdownCoordinator, install_signal_handlers};

use crate::cli::{Cli, Commands, Scenario};
use crate::client::DispatchClient;
use crate::demos::{self, DemoOptions};
use crate::fixtures;
use crate::service;

/// Route a parsed command line to its handler.
///
/// # Errors
///
/// Returns whatever the selected command fails with.
pub async fn execute_command(cli: Cli) -> Result<()> {
    let client = DispatchClient::new(cli.url);

    match cli.command {
        Commands::Serve {
            config,
            port,
            bind,
            topics,
        } => cmd_serve(config, port, bind, topics).await,

        Commands::PostReaction { file } => {
            let response = client.post_reaction(&read_json(&file).await?).await?;
            print_json(&response)
        }

        Commands::PostRequirements { file } => {
            let response = client.post_requirements(&read_json(&file).await?).await?;
            print_json(&response)
        }

        Commands::Publish {
            topic,
            file,
            custom,
        } => {
            let message = match (file, custom) {
                (Some(file), _) => read_json(&file).await?,
                (None, Some(content)) => fixtures::custom_message(&content),
                (None, None) => anyhow::bail!("Nothing to publish: pass --file or --custom"),
            };
            let key = client.publish(&topic, &message).await?;
            println!("{key}");
            Ok(())
        }

        Commands::Poll { topic, timeout_ms } => {
            let batch = client
                .poll(&topic, Duration::from_millis(timeout_ms))
                .await?;
            for envelope in &batch {
                print_json(&envelope.payload)?;
            }
            Ok(())
        }

        Commands::Demo {
            scenario,
            topic,
            timeout_ms,
        } => {
            let options = DemoOptions {
                topic,
                timeout: Duration::from_millis(timeout_ms),
                ..DemoOptions::default()
            };
            cmd_demo(&client, scenario, &options).await
        }
    }
}

async fn cmd_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<std::net::IpAddr>,
    topics: Vec<String>,
) -> Result<()> {
    let mut config =
        DispatchConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if !topics.is_empty() {
        config.broker.inbound_topics = topics;
    }
    config.validate().context("Invalid configuration")?;

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let _signals = install_signal_handlers(Arc::clone(&shutdown));

    info!(
        %addr,
        topics = ?config.broker.inbound_topics,
        "dispatch is running. Press Ctrl+C to stop."
    );
    let stats = service::serve(config, listener, shutdown).await?;
    info!(
        envelopes = stats.envelopes,
        published = stats.published,
        "dispatch stopped gracefully"
    );
    Ok(())
}

async fn cmd_demo(client: &DispatchClient, scenario: Scenario, options: &DemoOptions) -> Result<()> {
    info!(?scenario, url = client.base_url(), topic = %options.topic, "Running demo");

    match scenario {
        Scenario::MultiStep => print_json(&demos::multi_step(client, options).await?),
        Scenario::Priority => print_json(&demos::priority(client, options).await?),
        Scenario::Conditional => print_json(&demos::conditional(client, options).await?),
    }
}

async fn read_json(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
