//! Reaction rule documents.
//!
//! A rule binds a filter over inbound messages to an action. Actions are a
//! closed set of variants: a direct publish, a conditional publish with a
//! fallback, or a built-in allocation command.

use serde::{Deserialize, Serialize};

use dispatch_core::{Error, Result};
use dispatch_events::{MessageKind, ResourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRule {
    pub reaction_id: String,
    pub filter_expression: FilterExpression,
    pub action: Action,
}

/// Predicate over an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterExpression {
    pub message_type: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Conditional(ConditionalAction),
    Direct(DirectAction),
    Builtin(BuiltinAction),
}

/// Publish `message` on `topic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectAction {
    pub topic: String,
    pub message: String,
}

/// Publish `action` when the check holds, `fallback` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAction {
    pub conditional_check: Condition,
    pub action: DirectAction,
    pub fallback: DirectAction,
}

/// Named checks against the resource registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "condition_name")]
pub enum Condition {
    ContainsResourceWithId { id: ResourceId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinAction {
    /// Release every allocation and re-allocate heaviest sets first.
    KeepHighestWeightFunctionalities,
}

impl DirectAction {
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

impl FilterExpression {
    pub const fn on(message_type: MessageKind) -> Self {
        Self {
            message_type,
            label_key: None,
            label_value: None,
            content: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_key = Some(key.into());
        self.label_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

impl ReactionRule {
    pub fn new(reaction_id: impl Into<String>, filter: FilterExpression, action: Action) -> Self {
        Self {
            reaction_id: reaction_id.into(),
            filter_expression: filter,
            action,
        }
    }

    /// Check the document before it is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] when the id is empty, only one of
    /// `labelKey`/`labelValue` is given, a label filter targets a message type
    /// without a resource, a content filter targets anything other than
    /// `CustomMessageContent`, or an action names an empty topic or id.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::invalid_rule(&self.reaction_id, reason));
        let filter = &self.filter_expression;

        if self.reaction_id.trim().is_empty() {
            return invalid("reactionId must not be empty");
        }

        match (&filter.label_key, &filter.label_value) {
            (Some(_), None) => return invalid("labelKey given without labelValue"),
            (None, Some(_)) => return invalid("labelValue given without labelKey"),
            (Some(_), Some(_)) if !filter.message_type.carries_resource() => {
                return invalid(&format!(
                    "label filter on {} which carries no resource",
                    filter.message_type
                ));
            }
            _ => {}
        }

        if filter.content.is_some() && filter.message_type != MessageKind::CustomMessageContent {
            return invalid(&format!(
                "content filter on {}; only CustomMessageContent has content",
                filter.message_type
            ));
        }

        let empty_topic = |action: &DirectAction| action.topic.trim().is_empty();
        match &self.action {
            Action::Direct(direct) if empty_topic(direct) => invalid("action topic must not be empty"),
            Action::Conditional(conditional)
                if empty_topic(&conditional.action) || empty_topic(&conditional.fallback) =>
            {
                invalid("conditional action and fallback need a topic")
            }
            Action::Conditional(ConditionalAction {
                conditional_check: Condition::ContainsResourceWithId { id },
                ..
            }) if id.as_str().is_empty() => invalid("ContainsResourceWithId needs an id"),
            _ => Ok(()),
        }
    }
}
