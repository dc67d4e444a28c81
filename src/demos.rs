//! The bundled scenarios, driven over HTTP against a running service.
//!
//! Each scenario registers its rules, publishes its messages on the inbound
//! topic and waits for the action messages the rules should produce.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::client::DispatchClient;
use crate::fixtures;

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Inbound topic the service polls.
    pub topic: String,
    /// Topic rebalance reports are published on.
    pub report_topic: String,
    /// Wait per expected message.
    pub timeout: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            topic: "resources-topic-1".to_string(),
            report_topic: "functionalities".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiStepReport {
    pub map_download: Value,
    pub zone_assignment: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityReport {
    pub rebalance: Value,
    pub requirement_sets: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionalReport {
    pub without_dispatcher: Value,
    pub with_dispatcher: Value,
}

fn is_configuration_step(payload: &Value, step: &str) -> bool {
    let content = &payload["trigger"]["content"];
    content["id"] == "agv_1" && content["labels"]["configuration_step"] == step
}

/// Two-step AGV configuration: each label change is answered with the next
/// instruction for the AGV.
///
/// # Errors
///
/// Fails when the service is unreachable or an expected action never arrives.
pub async fn multi_step(client: &DispatchClient, options: &DemoOptions) -> Result<MultiStepReport> {
    for reaction in fixtures::configuration_reactions() {
        client.post_reaction(&reaction).await?;
    }

    client
        .publish(&options.topic, &fixtures::configuration_step("not_configured"))
        .await?;
    let map_download = client
        .wait_for(fixtures::CONFIGURATION_TOPIC, options.timeout, |p| {
            is_configuration_step(p, "not_configured")
        })
        .await?
        .context("No map download instruction for agv_1")?;
    info!("First step completed");

    client
        .publish(&options.topic, &fixtures::configuration_step("map_downloaded"))
        .await?;
    let zone_assignment = client
        .wait_for(fixtures::CONFIGURATION_TOPIC, options.timeout, |p| {
            is_configuration_step(p, "map_downloaded")
        })
        .await?
        .context("No zone assignment instruction for agv_1")?;
    info!("Second step completed");

    Ok(MultiStepReport {
        map_download,
        zone_assignment,
    })
}

/// Three weighted cargo handling sets share twelve AGVs. Five AGVs drop out,
/// then a critical event asks for the heaviest sets to be kept running.
///
/// # Errors
///
/// Fails when the service is unreachable or no rebalance report arrives.
pub async fn priority(client: &DispatchClient, options: &DemoOptions) -> Result<PriorityReport> {
    for set in fixtures::cargo_requirements() {
        client.post_requirements(&set).await?;
    }

    let registrations = fixtures::register_agvs(12)
        .into_iter()
        .chain(fixtures::register_rtgs(3));
    for message in registrations {
        client.publish(&options.topic, &message).await?;
    }
    client
        .post_reaction(&fixtures::critical_traffic_reaction())
        .await?;

    for message in fixtures::deregister_agvs(5) {
        client.publish(&options.topic, &message).await?;
    }
    info!("Five AGVs deregistered");

    client
        .publish(&options.topic, &fixtures::custom_message("critical_event"))
        .await?;
    let rebalance = client
        .wait_for(&options.report_topic, options.timeout, |p| {
            p.get("satisfied").is_some()
        })
        .await?
        .context("No rebalance report after critical_event")?;
    info!(report = %rebalance, "Allocations rebalanced");

    Ok(PriorityReport {
        rebalance,
        requirement_sets: client.requirement_sets().await?,
    })
}

/// A fire alarm goes to emergency services until a parking zone dispatcher
/// is registered, then to the resources.
///
/// # Errors
///
/// Fails when the service is unreachable or an expected action never arrives.
pub async fn conditional(client: &DispatchClient, options: &DemoOptions) -> Result<ConditionalReport> {
    client.post_reaction(&fixtures::parking_reaction()).await?;

    client
        .publish(&options.topic, &fixtures::custom_message("fire"))
        .await?;
    let without_dispatcher = client
        .wait_for(fixtures::EMERGENCY_TOPIC, options.timeout, |p| {
            p["message"] == "HELP!"
        })
        .await?
        .context("No call for help without a parking zone dispatcher")?;

    client
        .publish(&options.topic, &fixtures::parking_zone_dispatcher())
        .await?;
    client
        .publish(&options.topic, &fixtures::custom_message("fire"))
        .await?;
    let with_dispatcher = client
        .wait_for(fixtures::PARKING_TOPIC, options.timeout, |p| {
            p["message"] == "go_to_parking"
        })
        .await?
        .context("No parking order with a parking zone dispatcher")?;

    Ok(ConditionalReport {
        without_dispatcher,
        with_dispatcher,
    })
}
