//! Documents used by the bundled scenarios.

use serde_json::{Value, json};

pub const CONFIGURATION_TOPIC: &str = "agv_1";
pub const EMERGENCY_TOPIC: &str = "112";
pub const PARKING_TOPIC: &str = "resource";

pub fn configuration_reactions() -> [Value; 2] {
    [
        json!({
            "reactionId": "multi_step_configuration_1",
            "filterExpression": {
                "messageType": "ResourceWithLabelIsAvailable",
                "labelKey": "configuration_step",
                "labelValue": "not_configured"
            },
            "action": {
                "topic": CONFIGURATION_TOPIC,
                "message": "map_download_link: http://proper_address.com"
            }
        }),
        json!({
            "reactionId": "multi_step_configuration_2",
            "filterExpression": {
                "messageType": "ResourceWithLabelIsAvailable",
                "labelKey": "configuration_step",
                "labelValue": "map_downloaded"
            },
            "action": {
                "topic": CONFIGURATION_TOPIC,
                "message": "ask_assigner_for_zone. assigner_location: ABC"
            }
        }),
    ]
}

/// `agv_1` announcing itself at configuration step `step`.
pub fn configuration_step(step: &str) -> Value {
    json!({
        "messageType": "RegisterResource",
        "resource": {"id": "agv_1", "labels": {"configuration_step": step}}
    })
}

fn typed_resource(message_type: &str, kind: &str, n: usize) -> Value {
    json!({
        "messageType": message_type,
        "resource": {"id": format!("{kind}_{n}"), "labels": {"resource_type": kind}}
    })
}

/// `agv_1` through `agv_{count}`.
pub fn register_agvs(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|n| typed_resource("RegisterResource", "agv", n))
        .collect()
}

pub fn deregister_agvs(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|n| typed_resource("DeregisterResource", "agv", n))
        .collect()
}

pub fn register_rtgs(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|n| typed_resource("RegisterResource", "rtg", n))
        .collect()
}

fn cargo_handling(priority: &str, rtg: &str, agvs: usize, weight: f64) -> Value {
    json!({
        "id": format!("{priority}_priority_cargo_handling"),
        "labels": {},
        "requirements": [
            {"id": rtg, "exclusive": true},
            {"labelKey": "resource_type", "labelValue": "agv", "count": agvs, "exclusive": true}
        ],
        "weight": weight
    })
}

/// High, medium and low priority cargo handling, heaviest first.
pub fn cargo_requirements() -> [Value; 3] {
    [
        cargo_handling("high", "rtg_1", 5, 10.0),
        cargo_handling("medium", "rtg_2", 4, 7.0),
        cargo_handling("low", "rtg_3", 3, 5.0),
    ]
}

pub fn critical_traffic_reaction() -> Value {
    json!({
        "reactionId": "keep_critical_traffic_running",
        "filterExpression": {"messageType": "CustomMessageContent", "content": "critical_event"},
        "action": "KeepHighestWeightFunctionalities"
    })
}

pub fn parking_reaction() -> Value {
    json!({
        "reactionId": "go_to_parking",
        "filterExpression": {"messageType": "CustomMessageContent", "content": "fire"},
        "action": {
            "conditionalCheck": {
                "condition_name": "ContainsResourceWithId",
                "id": "parking_zone_dispatcher"
            },
            "action": {"topic": PARKING_TOPIC, "message": "go_to_parking"},
            "fallback": {"topic": EMERGENCY_TOPIC, "message": "HELP!"}
        }
    })
}

pub fn parking_zone_dispatcher() -> Value {
    json!({
        "messageType": "RegisterResource",
        "resource": {"id": "parking_zone_dispatcher", "labels": {}}
    })
}

pub fn custom_message(content: &str) -> Value {
    json!({"messageType": "CustomMessageContent", "content": content})
}
