//! Decoding the message documents producers actually put on topics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::Duration;

use dispatch_events::{InMemoryBroker, Message, MessageKind, Transport};
use serde_json::json;

fn agv_registrations(count: usize) -> Vec<serde_json::Value> {
    (1..=count)
        .map(|n| {
            json!({
                "messageType": "RegisterResource",
                "resource": {"id": format!("agv_{n}"), "labels": {"resource_type": "agv"}}
            })
        })
        .collect()
}

#[test]
fn test_deregister_with_labels_decodes() {
    let message = Message::from_value(json!({
        "messageType": "DeregisterResource",
        "resource": {"id": "agv_3", "labels": {"resource_type": "agv"}}
    }))
    .unwrap();

    assert_eq!(message.kind(), MessageKind::DeregisterResource);
    assert_eq!(message.resource().unwrap().id.as_str(), "agv_3");
}

#[test]
fn test_deregister_without_labels_decodes() {
    let message = Message::from_value(json!({
        "messageType": "DeregisterResource",
        "resource": {"id": "agv_3"}
    }))
    .unwrap();

    assert!(message.resource().unwrap().labels.is_empty());
}

#[test]
fn test_unknown_message_type_is_malformed() {
    let result = Message::from_value(json!({"messageType": "Teleport", "content": "x"}));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_registration_batch_survives_the_broker() {
    let broker = InMemoryBroker::new();
    for payload in agv_registrations(12) {
        broker.send("resources-topic-2", payload).await.unwrap();
    }

    let batch = broker
        .poll("resources-topic-2", Duration::from_millis(50))
        .await
        .unwrap();

    let ids: Vec<String> = batch
        .into_iter()
        .map(|envelope| Message::from_value(envelope.payload).unwrap())
        .filter_map(|message| message.resource().map(|r| r.id.to_string()))
        .collect();

    assert_eq!(ids.len(), 12);
    assert_eq!(ids.first().map(String::as_str), Some("agv_1"));
    assert_eq!(ids.last().map(String::as_str), Some("agv_12"));
}
