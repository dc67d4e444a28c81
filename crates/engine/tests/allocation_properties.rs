//! Property-based tests for registry idempotence and weighted preemption.
//!
//! Uses proptest to validate:
//! - Registering the same resource twice is observably the same as once
//! - A contested exclusive resource ends with the heavier set, in either order
//! - Equal weights keep the first holder

#![allow(clippy::unwrap_used)]

use dispatch_engine::{
    AllocationStatus, FleetState, Requirement, RequirementMatcher, RequirementSet, ResourceRegistry,
};
use dispatch_events::{Message, Resource};
use proptest::prelude::*;

fn crane_set(id: &str, weight: f64) -> RequirementSet {
    RequirementSet {
        id: id.to_string(),
        labels: Default::default(),
        requirements: vec![Requirement::by_id("rtg_1", true)],
        weight,
    }
}

fn resource_strategy() -> impl Strategy<Value = Resource> {
    (
        "[a-z]{1,6}_[0-9]{1,2}",
        prop::collection::btree_map("[a-z_]{1,10}", "[a-z0-9_]{0,10}", 0..4),
    )
        .prop_map(|(id, labels)| Resource {
            id: id.into(),
            labels,
        })
}

proptest! {
    /// Property: idempotent registration
    #[test]
    fn prop_register_twice_equals_once(resources in prop::collection::vec(resource_strategy(), 1..12)) {
        let mut once = ResourceRegistry::new();
        let mut twice = ResourceRegistry::new();

        for resource in &resources {
            once.register(resource.clone());
            twice.register(resource.clone());
            twice.register(resource.clone());
        }

        let once: Vec<Resource> = once.iter().cloned().collect();
        let twice: Vec<Resource> = twice.iter().cloned().collect();
        prop_assert_eq!(once, twice);
    }

    /// Property: duplicate delivery of a registration derives no second trigger
    #[test]
    fn prop_duplicate_delivery_is_silent(resource in resource_strategy()) {
        let mut fleet = FleetState::new();
        let first = fleet.apply(&Message::register(resource.clone()));
        let second = fleet.apply(&Message::register(resource));

        prop_assert_eq!(first.triggers.len(), 2);
        prop_assert_eq!(second.triggers.len(), 1);
    }

    /// Property: heavier set holds the contested resource regardless of order
    #[test]
    fn prop_heavier_set_wins_in_either_order(
        light in 0.0f64..100.0,
        extra in 0.001f64..100.0,
        heavy_first in any::<bool>(),
    ) {
        let heavy = light + extra;
        let mut registry = ResourceRegistry::new();
        registry.register(Resource::new("rtg_1"));

        let mut matcher = RequirementMatcher::new();
        let order = if heavy_first { ["heavy", "light"] } else { ["light", "heavy"] };
        for id in order {
            let weight = if id == "heavy" { heavy } else { light };
            matcher.upsert(crane_set(id, weight)).unwrap();
            matcher.evaluate(id, &registry).unwrap();
        }

        prop_assert_eq!(matcher.holders("rtg_1"), vec!["heavy"]);
        prop_assert_eq!(matcher.status("heavy"), Some(&AllocationStatus::Satisfied));
        prop_assert!(matcher.allocation("light").is_none_or(|a| a.is_empty()));
    }

    /// Property: equal weight means first-come keeps the resource
    #[test]
    fn prop_equal_weight_first_come(weight in 0.0f64..100.0) {
        let mut registry = ResourceRegistry::new();
        registry.register(Resource::new("rtg_1"));

        let mut matcher = RequirementMatcher::new();
        for id in ["first", "second"] {
            matcher.upsert(crane_set(id, weight)).unwrap();
            matcher.evaluate(id, &registry).unwrap();
        }

        prop_assert_eq!(matcher.holders("rtg_1"), vec!["first"]);
        let second_unsatisfied = matches!(
            matcher.status("second"),
            Some(AllocationStatus::Unsatisfied { .. })
        );
        prop_assert!(second_unsatisfied);
    }
}
