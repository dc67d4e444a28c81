//! End-to-end dispatcher tests over the in-memory broker.
//!
//! Each test runs the real loop: messages go in on an inbound topic, action
//! messages come out on the topics the rules name.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use dispatch_engine::{
    Action, AllocationStatus, BuiltinAction, Condition, ConditionalAction, DirectAction,
    DispatchStats, Dispatcher, DispatcherConfig, FilterExpression, ReactionRule, Requirement,
    RequirementSet, SharedState, ShutdownCoordinator, ShutdownSignal,
};
use dispatch_events::{InMemoryBroker, Message, MessageKind, Resource, ResourceId, Transport};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const INBOUND: &str = "resources-topic-1";

struct Harness {
    broker: Arc<InMemoryBroker>,
    state: SharedState,
    shutdown: Arc<ShutdownCoordinator>,
    handle: JoinHandle<dispatch_core::Result<DispatchStats>>,
}

impl Harness {
    async fn start(rules: Vec<ReactionRule>) -> Self {
        Self::start_with_backlog(rules, &[INBOUND], Duration::from_millis(20), Vec::new()).await
    }

    /// Start after `backlog` is already waiting on the broker.
    async fn start_with_backlog(
        rules: Vec<ReactionRule>,
        topics: &[&str],
        poll_timeout: Duration,
        backlog: Vec<(&str, Message)>,
    ) -> Self {
        let broker = InMemoryBroker::new_arc();
        for (topic, message) in backlog {
            broker.send(topic, message.to_value().unwrap()).await.unwrap();
        }
        let state = SharedState::new();
        for rule in rules {
            state.register_rule(rule).await.unwrap();
        }
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let config = DispatcherConfig {
            inbound_topics: topics.iter().map(ToString::to_string).collect(),
            poll_timeout,
            report_topic: "functionalities".to_string(),
        };
        let dispatcher = Dispatcher::new(
            Arc::clone(&broker),
            state.clone(),
            config,
            Arc::clone(&shutdown),
        );
        let handle = tokio::spawn(dispatcher.run());

        Self {
            broker,
            state,
            shutdown,
            handle,
        }
    }

    async fn send(&self, message: Message) {
        self.broker
            .send(INBOUND, message.to_value().unwrap())
            .await
            .unwrap();
    }

    async fn take(&self, topic: &str) -> Vec<Value> {
        self.broker
            .poll(topic, Duration::from_millis(500))
            .await
            .unwrap()
            .into_iter()
            .map(|envelope| envelope.payload)
            .collect()
    }

    /// Wait for the dispatcher to take every inbound envelope and apply it.
    async fn wait_until_consumed(&self) {
        for _ in 0..200 {
            if self.broker.pending(INBOUND).await == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("inbound topic was never drained");
    }

    async fn stop(self) -> DispatchStats {
        self.shutdown
            .initiate_shutdown(ShutdownSignal::Programmatic)
            .await;
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("dispatcher did not stop")
            .expect("dispatcher task panicked")
            .expect("dispatcher failed")
    }
}

fn configuration_rule() -> ReactionRule {
    ReactionRule::new(
        "multi_step_configuration_1",
        FilterExpression::on(MessageKind::ResourceWithLabelIsAvailable)
            .with_label("configuration_step", "not_configured"),
        Action::Direct(DirectAction::new(
            "agv_1",
            "map_download_link: http://proper_address.com",
        )),
    )
}

fn fire_rule() -> ReactionRule {
    ReactionRule::new(
        "go_to_parking",
        FilterExpression::on(MessageKind::CustomMessageContent).with_content("fire"),
        Action::Conditional(ConditionalAction {
            conditional_check: Condition::ContainsResourceWithId {
                id: ResourceId::new("parking_zone_dispatcher"),
            },
            action: DirectAction::new("resource", "go_to_parking"),
            fallback: DirectAction::new("112", "HELP!"),
        }),
    )
}

fn agv(id: &str, step: &str) -> Resource {
    Resource::new(id).with_label("configuration_step", step)
}

#[tokio::test]
async fn test_label_available_message_fires_rule() {
    let harness = Harness::start(vec![configuration_rule()]).await;

    harness
        .send(Message::label_available(agv("agv_1", "not_configured")))
        .await;

    let published = harness.take("agv_1").await;
    assert_eq!(published.len(), 1);
    let action = published.first().unwrap();
    assert_eq!(action["message"], "map_download_link: http://proper_address.com");
    assert_eq!(action["trigger"]["content"]["id"], "agv_1");

    harness.stop().await;
}

#[tokio::test]
async fn test_non_matching_label_emits_nothing() {
    let harness = Harness::start(vec![configuration_rule()]).await;

    harness
        .send(Message::label_available(agv("agv_1", "map_downloaded")))
        .await;
    harness.wait_until_consumed().await;
    let stats = harness.stop().await;

    assert_eq!(stats.envelopes, 1);
    assert_eq!(stats.published, 0);
}

#[tokio::test]
async fn test_registration_fires_label_rule_through_derived_trigger() {
    let harness = Harness::start(vec![configuration_rule()]).await;

    harness
        .send(Message::register(agv("agv_1", "not_configured")))
        .await;
    let first = harness.take("agv_1").await;

    // Same labels again: no change, no second action.
    harness
        .send(Message::register(agv("agv_1", "not_configured")))
        .await;
    harness.wait_until_consumed().await;
    let stats = harness.stop().await;

    assert_eq!(first.len(), 1);
    assert_eq!(first.first().unwrap()["trigger"]["messageType"], "ResourceWithLabelIsAvailable");
    assert_eq!(stats.published, 1);
}

#[tokio::test]
async fn test_conditional_falls_back_without_parking_dispatcher() {
    let harness = Harness::start(vec![fire_rule()]).await;

    harness.send(Message::custom("fire")).await;

    let help = harness.take("112").await;
    assert_eq!(help.len(), 1);
    assert_eq!(help.first().unwrap()["message"], "HELP!");
    assert_eq!(harness.broker.pending("resource").await, 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_conditional_takes_action_with_parking_dispatcher() {
    let harness = Harness::start(vec![fire_rule()]).await;

    harness
        .send(Message::register(Resource::new("parking_zone_dispatcher")))
        .await;
    harness.wait_until_consumed().await;
    harness.send(Message::custom("fire")).await;

    let parking = harness.take("resource").await;
    assert_eq!(parking.len(), 1);
    assert_eq!(parking.first().unwrap()["message"], "go_to_parking");

    harness.stop().await;
}

#[tokio::test]
async fn test_each_fire_sees_registry_as_it_arrived() {
    let backlog = vec![
        (INBOUND, Message::custom("fire")),
        (INBOUND, Message::register(Resource::new("parking_zone_dispatcher"))),
        (INBOUND, Message::custom("fire")),
    ];
    let harness =
        Harness::start_with_backlog(vec![fire_rule()], &[INBOUND], Duration::from_millis(20), backlog)
            .await;
    let broker = Arc::clone(&harness.broker);

    harness.wait_until_consumed().await;
    let stats = harness.stop().await;

    let help = broker.poll("112", Duration::from_millis(10)).await.unwrap();
    let parking = broker.poll("resource", Duration::from_millis(10)).await.unwrap();
    assert_eq!(help.len(), 1);
    assert_eq!(parking.len(), 1);
    assert_eq!(stats.published, 2);
}

#[tokio::test]
async fn test_shutdown_keeps_batch_from_a_returned_poll() {
    let backlog = vec![("topic_a", Message::custom("fire"))];
    let harness = Harness::start_with_backlog(
        vec![fire_rule()],
        &["topic_a", "topic_b"],
        Duration::from_secs(2),
        backlog,
    )
    .await;
    let broker = Arc::clone(&harness.broker);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = harness.stop().await;

    assert_eq!(broker.pending("topic_a").await, 0);
    assert_eq!(stats.envelopes, 1);
    let help = broker.poll("112", Duration::from_millis(10)).await.unwrap();
    assert_eq!(help.len(), 1);
}

#[tokio::test]
async fn test_malformed_messages_are_skipped() {
    let harness = Harness::start(vec![fire_rule()]).await;

    harness
        .broker
        .send(INBOUND, json!({"messageType": "RegisterResource"}))
        .await
        .unwrap();
    harness
        .broker
        .send(INBOUND, json!({"hello": "world"}))
        .await
        .unwrap();
    harness.send(Message::custom("fire")).await;

    let help = harness.take("112").await;
    let stats = harness.stop().await;

    assert_eq!(help.len(), 1);
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.envelopes, 3);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_evaluations() {
    let harness = Harness::start(vec![configuration_rule()]).await;

    for n in 1..=50 {
        harness
            .send(Message::label_available(agv(&format!("agv_{n}"), "not_configured")))
            .await;
    }
    harness.wait_until_consumed().await;
    let stats = harness.stop().await;

    assert_eq!(stats.published, 50);
    assert_eq!(stats.reactions, 50);
}

#[tokio::test]
async fn test_deregistration_invalidates_only_that_resource() {
    let harness = Harness::start(Vec::new()).await;

    for n in 1..=3 {
        harness
            .send(Message::register(
                Resource::new(format!("agv_{n}")).with_label("resource_type", "agv"),
            ))
            .await;
    }
    harness.wait_until_consumed().await;

    let set = RequirementSet {
        id: "yard_shuttle".into(),
        labels: Default::default(),
        requirements: vec![Requirement::by_label("resource_type", "agv", 3, true)],
        weight: 5.0,
    };
    let (_, outcome) = harness.state.upsert_requirements(set).await.unwrap();
    assert!(outcome.is_allocated());

    harness
        .send(Message::deregister(Resource::new("agv_2")))
        .await;
    harness.wait_until_consumed().await;

    let fleet = harness.state.fleet().await;
    let allocation = fleet.matcher.allocation("yard_shuttle").unwrap();
    assert!(allocation.contains("agv_1"));
    assert!(allocation.contains("agv_3"));
    assert!(!allocation.contains("agv_2"));
    assert!(matches!(
        fleet.matcher.status("yard_shuttle"),
        Some(AllocationStatus::Unsatisfied { .. })
    ));
    drop(fleet);

    harness.stop().await;
}

#[tokio::test]
async fn test_critical_event_rebalances_and_reports() {
    let rule = ReactionRule::new(
        "keep_critical_traffic_running",
        FilterExpression::on(MessageKind::CustomMessageContent).with_content("critical_event"),
        Action::Builtin(BuiltinAction::KeepHighestWeightFunctionalities),
    );
    let harness = Harness::start(vec![rule]).await;

    harness.send(Message::register(Resource::new("rtg_1"))).await;
    harness.wait_until_consumed().await;

    for (id, weight) in [("low_priority_cargo_handling", 1.0), ("high_priority_cargo_handling", 10.0)] {
        let set = RequirementSet {
            id: id.into(),
            labels: Default::default(),
            requirements: vec![Requirement::by_id("rtg_1", true)],
            weight,
        };
        harness.state.upsert_requirements(set).await.unwrap();
    }

    harness.send(Message::custom("critical_event")).await;
    let reports = harness.take("functionalities").await;
    let stats = harness.stop().await;

    assert_eq!(reports.len(), 1);
    let report = reports.first().unwrap();
    assert_eq!(report["satisfied"], json!(["high_priority_cargo_handling"]));
    assert_eq!(report["unsatisfied"][0]["set_id"], "low_priority_cargo_handling");
    assert_eq!(stats.rebalances, 1);
}
