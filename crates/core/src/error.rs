//! Core error types for dispatch operations.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.
//! Non-matches are never errors: a rule that does not fire or a requirement
//! set that cannot be satisfied is a normal outcome, reported as data.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for dispatch operations.
#[derive(Debug, Error)]
pub enum Error {
    // Message errors
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    #[error("unknown resource '{id}'")]
    UnknownResource { id: String },

    // Registration errors
    #[error("invalid reaction rule '{reaction_id}': {reason}")]
    InvalidRule { reaction_id: String, reason: String },

    #[error("invalid requirement set '{set_id}': {reason}")]
    InvalidRequirements { set_id: String, reason: String },

    #[error("unknown requirement set '{set_id}'")]
    UnknownRequirementSet { set_id: String },

    // Transport errors
    #[error("transport unavailable for topic '{topic}': {reason}")]
    TransportUnavailable { topic: String, reason: String },

    // Configuration errors
    #[error("failed to read config file '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Parsing errors
    #[error("JSON parse error: {reason}")]
    JsonParseFailed { reason: String },

    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed message error.
    pub fn malformed_message(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Create an unknown resource error.
    pub fn unknown_resource(id: impl Into<String>) -> Self {
        Self::UnknownResource { id: id.into() }
    }

    /// Create an invalid rule error.
    pub fn invalid_rule(reaction_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            reaction_id: reaction_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid requirement set error.
    pub fn invalid_requirements(set_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequirements {
            set_id: set_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown requirement set error.
    pub fn unknown_requirement_set(set_id: impl Into<String>) -> Self {
        Self::UnknownRequirementSet {
            set_id: set_id.into(),
        }
    }

    /// Create a transport unavailable error.
    pub fn transport_unavailable(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a config read error.
    pub fn config_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse_failed(reason: impl Into<String>) -> Self {
        Self::JsonParseFailed {
            reason: reason.into(),
        }
    }

    /// Whether the error should stop the caller or only be logged.
    ///
    /// Malformed input and late references to unknown resources are expected
    /// under at-least-once delivery.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::UnknownResource { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::json_parse_failed(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::TomlParseFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_rule("go_to_parking", "labelKey without labelValue");
        assert!(err.to_string().contains("go_to_parking"));
        assert!(err.to_string().contains("labelKey without labelValue"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = Error::transport_unavailable("resources-topic-1", "broker closed");
        assert!(err.to_string().contains("resources-topic-1"));
        assert!(err.to_string().contains("broker closed"));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::malformed_message("missing messageType").is_recoverable());
        assert!(Error::unknown_resource("agv_9").is_recoverable());
        assert!(!Error::transport_unavailable("t", "down").is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err = parse.map_err(Error::from);
        assert!(matches!(err, Err(Error::JsonParseFailed { .. })));
    }
}
