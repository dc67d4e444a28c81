//! Messages carried on topics.
//!
//! Inbound messages are tagged by `messageType`. Outbound action messages carry
//! the text of the fired action together with the message that triggered it.

use serde::{Deserialize, Serialize};

use dispatch_core::{Error, Result};

use crate::types::Resource;

/// An inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum Message {
    /// A resource appeared or its labels changed. Carries the full label set.
    RegisterResource { resource: Resource },
    /// A resource went away. Labels are ignored.
    DeregisterResource { resource: Resource },
    /// A resource is available with the labels it carries.
    ResourceWithLabelIsAvailable {
        #[serde(alias = "resource")]
        content: Resource,
    },
    /// Free-form event such as `fire` or `critical_event`.
    CustomMessageContent { content: String },
}

/// The `messageType` discriminator, used by rule filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    RegisterResource,
    DeregisterResource,
    ResourceWithLabelIsAvailable,
    CustomMessageContent,
}

impl MessageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegisterResource => "RegisterResource",
            Self::DeregisterResource => "DeregisterResource",
            Self::ResourceWithLabelIsAvailable => "ResourceWithLabelIsAvailable",
            Self::CustomMessageContent => "CustomMessageContent",
        }
    }

    /// Whether messages of this kind embed a resource.
    pub const fn carries_resource(self) -> bool {
        !matches!(self, Self::CustomMessageContent)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    pub const fn register(resource: Resource) -> Self {
        Self::RegisterResource { resource }
    }

    pub const fn deregister(resource: Resource) -> Self {
        Self::DeregisterResource { resource }
    }

    pub const fn label_available(resource: Resource) -> Self {
        Self::ResourceWithLabelIsAvailable { content: resource }
    }

    pub fn custom(content: impl Into<String>) -> Self {
        Self::CustomMessageContent {
            content: content.into(),
        }
    }

    /// Decode a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] when the payload lacks `messageType`
    /// or the fields that type requires.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::malformed_message(e.to_string()))
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::RegisterResource { .. } => MessageKind::RegisterResource,
            Self::DeregisterResource { .. } => MessageKind::DeregisterResource,
            Self::ResourceWithLabelIsAvailable { .. } => MessageKind::ResourceWithLabelIsAvailable,
            Self::CustomMessageContent { .. } => MessageKind::CustomMessageContent,
        }
    }

    /// The embedded resource, for resource-carrying kinds.
    pub const fn resource(&self) -> Option<&Resource> {
        match self {
            Self::RegisterResource { resource }
            | Self::DeregisterResource { resource }
            | Self::ResourceWithLabelIsAvailable { content: resource } => Some(resource),
            Self::CustomMessageContent { .. } => None,
        }
    }

    /// The custom content string, for `CustomMessageContent`.
    pub fn custom_content(&self) -> Option<&str> {
        match self {
            Self::CustomMessageContent { content } => Some(content),
            _ => None,
        }
    }
}

/// Outbound message emitted when a rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    /// Text of the fired action, e.g. `map_download_link: ...`.
    pub message: String,
    /// The message that caused the rule to fire.
    pub trigger: Message,
}

impl ActionMessage {
    pub fn new(message: impl Into<String>, trigger: Message) -> Self {
        Self {
            message: message.into(),
            trigger,
        }
    }
}
