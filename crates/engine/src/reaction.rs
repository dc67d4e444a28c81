//! Reaction engine: rule store and rule evaluation.
//!
//! Evaluation is pure in the rule and the message. Conditional actions also
//! read the registry snapshot they are handed; nothing else is consulted.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use dispatch_core::Result;
use dispatch_events::{ActionMessage, Message};

use crate::registry::ResourceRegistry;
use crate::rules::{Action, BuiltinAction, Condition, DirectAction, FilterExpression, ReactionRule};

/// What a matching rule asks the dispatcher to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum Effect {
    Publish {
        topic: String,
        message: ActionMessage,
    },
    KeepHighestWeightFunctionalities,
}

/// An effect together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reaction {
    pub reaction_id: String,
    pub effect: Effect,
}

impl Condition {
    pub fn holds(&self, registry: &ResourceRegistry) -> bool {
        match self {
            Self::ContainsResourceWithId { id } => registry.contains(id.as_str()),
        }
    }
}

/// Whether `message` passes `filter`.
///
/// The kind must equal `messageType`. A label filter needs the embedded
/// resource to carry exactly that pair; a content filter needs the custom
/// content to be equal.
pub fn matches(filter: &FilterExpression, message: &Message) -> bool {
    if message.kind() != filter.message_type {
        return false;
    }

    let labels_match = match (&filter.label_key, &filter.label_value) {
        (Some(key), Some(value)) => message
            .resource()
            .is_some_and(|resource| resource.has_label(key, value)),
        _ => true,
    };

    let content_match = filter
        .content
        .as_deref()
        .is_none_or(|expected| message.custom_content() == Some(expected));

    labels_match && content_match
}

/// Evaluate one rule against one message.
pub fn evaluate(rule: &ReactionRule, message: &Message, registry: &ResourceRegistry) -> Option<Effect> {
    if !matches(&rule.filter_expression, message) {
        return None;
    }

    let publish = |action: &DirectAction| Effect::Publish {
        topic: action.topic.clone(),
        message: ActionMessage::new(action.message.clone(), message.clone()),
    };

    let effect = match &rule.action {
        Action::Direct(action) => publish(action),
        Action::Conditional(conditional) => {
            let holds = conditional.conditional_check.holds(registry);
            debug!(reaction_id = %rule.reaction_id, holds, "Conditional check evaluated");
            if holds {
                publish(&conditional.action)
            } else {
                publish(&conditional.fallback)
            }
        }
        Action::Builtin(BuiltinAction::KeepHighestWeightFunctionalities) => {
            Effect::KeepHighestWeightFunctionalities
        }
    };

    Some(effect)
}

/// The registered rule set, keyed by `reactionId`.
#[derive(Debug, Clone, Default)]
pub struct ReactionEngine {
    rules: BTreeMap<String, ReactionRule>,
}

impl ReactionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a rule. Returns `true` when an existing rule with
    /// the same id was replaced.
    ///
    /// # Errors
    ///
    /// Returns [`dispatch_core::Error::InvalidRule`] if the rule fails validation.
    pub fn register(&mut self, rule: ReactionRule) -> Result<bool> {
        rule.validate()?;
        let reaction_id = rule.reaction_id.clone();
        let replaced = self.rules.insert(reaction_id.clone(), rule).is_some();
        info!(reaction_id = %reaction_id, replaced, "Reaction rule registered");
        Ok(replaced)
    }

    pub fn remove(&mut self, reaction_id: &str) -> Option<ReactionRule> {
        let removed = self.rules.remove(reaction_id);
        if removed.is_some() {
            info!(reaction_id, "Reaction rule removed");
        }
        removed
    }

    pub fn get(&self, reaction_id: &str) -> Option<&ReactionRule> {
        self.rules.get(reaction_id)
    }

    /// Rules in id order.
    pub fn rules(&self) -> impl Iterator<Item = &ReactionRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule independently against `message`. Reactions come
    /// back in rule id order.
    pub fn react(&self, message: &Message, registry: &ResourceRegistry) -> Vec<Reaction> {
        self.rules
            .values()
            .filter_map(|rule| {
                evaluate(rule, message, registry).map(|effect| Reaction {
                    reaction_id: rule.reaction_id.clone(),
                    effect,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::rules::ConditionalAction;
    use dispatch_core::Error;
    use dispatch_events::{MessageKind, Resource, ResourceId};

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

    fn agv_with_step(step: &str) -> Message {
        Message::label_available(Resource::new("agv_1").with_label("configuration_step", step))
    }

    #[test]
    fn test_label_rule_fires_on_matching_label() {
        let registry = ResourceRegistry::new();
        let message = agv_with_step("not_configured");

        let effect = evaluate(&configuration_rule(), &message, &registry);

        assert_eq!(
            effect,
            Some(Effect::Publish {
                topic: "agv_1".into(),
                message: ActionMessage::new("map_download_link: http://proper_address.com", message),
            })
        );
    }

    #[test]
    fn test_label_rule_ignores_other_value() {
        let registry = ResourceRegistry::new();
        let effect = evaluate(&configuration_rule(), &agv_with_step("map_downloaded"), &registry);
        assert_eq!(effect, None);
    }

    #[test]
    fn test_kind_must_match() {
        let message = Message::register(
            Resource::new("agv_1").with_label("configuration_step", "not_configured"),
        );
        assert!(!matches(&configuration_rule().filter_expression, &message));
    }

    #[test]
    fn test_conditional_takes_fallback_when_resource_missing() {
        let registry = ResourceRegistry::new();
        let effect = evaluate(&fire_rule(), &Message::custom("fire"), &registry).unwrap();

        let Effect::Publish { topic, message } = effect else {
            unreachable!("expected a publish");
        };
        assert_eq!(topic, "112");
        assert_eq!(message.message, "HELP!");
    }

    #[test]
    fn test_conditional_takes_action_when_resource_present() {
        let mut registry = ResourceRegistry::new();
        registry.register(Resource::new("parking_zone_dispatcher"));

        let effect = evaluate(&fire_rule(), &Message::custom("fire"), &registry).unwrap();

        assert!(matches!(effect, Effect::Publish { ref topic, .. } if topic == "resource"));
    }

    #[test]
    fn test_content_must_match_exactly() {
        let registry = ResourceRegistry::new();
        assert_eq!(evaluate(&fire_rule(), &Message::custom("Fire"), &registry), None);
    }

    #[test]
    fn test_builtin_yields_rebalance() {
        let rule = ReactionRule::new(
            "keep_critical_traffic_running",
            FilterExpression::on(MessageKind::CustomMessageContent).with_content("critical_event"),
            Action::Builtin(BuiltinAction::KeepHighestWeightFunctionalities),
        );
        let effect = evaluate(&rule, &Message::custom("critical_event"), &ResourceRegistry::new());
        assert_eq!(effect, Some(Effect::KeepHighestWeightFunctionalities));
    }

    #[test]
    fn test_register_replaces_by_id() {
        let mut engine = ReactionEngine::new();
        assert!(!engine.register(configuration_rule()).unwrap());
        assert!(engine.register(configuration_rule()).unwrap());
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_register_rejects_invalid_rule() {
        let mut engine = ReactionEngine::new();
        let mut rule = configuration_rule();
        rule.filter_expression.label_value = None;

        assert!(matches!(engine.register(rule), Err(Error::InvalidRule { .. })));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_react_returns_rule_id_order() {
        let mut engine = ReactionEngine::new();
        for id in ["zeta", "alpha", "mid"] {
            engine
                .register(ReactionRule::new(
                    id,
                    FilterExpression::on(MessageKind::CustomMessageContent),
                    Action::Direct(DirectAction::new(id, "ping")),
                ))
                .unwrap();
        }

        let order: Vec<String> = engine
            .react(&Message::custom("anything"), &ResourceRegistry::new())
            .into_iter()
            .map(|reaction| reaction.reaction_id)
            .collect();

        assert_eq!(order, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let registry = ResourceRegistry::new();
        let message = agv_with_step("not_configured");
        let rule = configuration_rule();

        assert_eq!(
            evaluate(&rule, &message, &registry),
            evaluate(&rule, &message, &registry)
        );
    }
}
