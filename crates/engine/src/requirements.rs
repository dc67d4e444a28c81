//! Requirement set documents.
//!
//! A requirement set names the resources a functionality needs together,
//! either by exact id or as a count of resources carrying a label, and a
//! weight used to decide who keeps contested exclusive resources.

use serde::{Deserialize, Serialize};

use dispatch_core::{Error, Result};
use dispatch_events::{Labels, Resource, ResourceId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub id: String,
    #[serde(default)]
    pub labels: Labels,
    pub requirements: Vec<Requirement>,
    pub weight: f64,
}

/// One line of a requirement set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    /// A specific resource.
    ById {
        id: ResourceId,
        #[serde(default)]
        exclusive: bool,
    },
    /// `count` resources carrying `labelKey=labelValue`.
    ByLabel {
        #[serde(rename = "labelKey")]
        label_key: String,
        #[serde(rename = "labelValue")]
        label_value: String,
        count: usize,
        #[serde(default)]
        exclusive: bool,
    },
}

impl Requirement {
    pub fn by_id(id: impl Into<ResourceId>, exclusive: bool) -> Self {
        Self::ById {
            id: id.into(),
            exclusive,
        }
    }

    pub fn by_label(
        key: impl Into<String>,
        value: impl Into<String>,
        count: usize,
        exclusive: bool,
    ) -> Self {
        Self::ByLabel {
            label_key: key.into(),
            label_value: value.into(),
            count,
            exclusive,
        }
    }

    pub const fn exclusive(&self) -> bool {
        match self {
            Self::ById { exclusive, .. } | Self::ByLabel { exclusive, .. } => *exclusive,
        }
    }

    /// How many resources this requirement needs.
    pub const fn count(&self) -> usize {
        match self {
            Self::ById { .. } => 1,
            Self::ByLabel { count, .. } => *count,
        }
    }

    /// Whether `resource` can fill this requirement, ignoring allocation.
    pub fn accepts(&self, resource: &Resource) -> bool {
        match self {
            Self::ById { id, .. } => resource.id == *id,
            Self::ByLabel {
                label_key,
                label_value,
                ..
            } => resource.has_label(label_key, label_value),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::ById { id, .. } => format!("resource '{id}'"),
            Self::ByLabel {
                label_key,
                label_value,
                count,
                ..
            } => format!("{count} x {label_key}={label_value}"),
        }
    }
}

impl RequirementSet {
    /// Check the document before it is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequirements`] for an empty id, a non-finite
    /// weight, an empty requirement list, or a requirement asking for zero
    /// resources or naming an empty id or label key.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::invalid_requirements(&self.id, reason));

        if self.id.trim().is_empty() {
            return invalid("id must not be empty");
        }
        if !self.weight.is_finite() {
            return invalid("weight must be a finite number");
        }
        if self.requirements.is_empty() {
            return invalid("at least one requirement is needed");
        }

        for (index, requirement) in self.requirements.iter().enumerate() {
            match requirement {
                Requirement::ById { id, .. } if id.as_str().is_empty() => {
                    return invalid(&format!("requirement {index}: id must not be empty"));
                }
                Requirement::ByLabel { label_key, .. } if label_key.is_empty() => {
                    return invalid(&format!("requirement {index}: labelKey must not be empty"));
                }
                Requirement::ByLabel { count: 0, .. } => {
                    return invalid(&format!("requirement {index}: count must be at least 1"));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn cargo_handling() -> serde_json::Value {
        json!({
            "id": "high_priority_cargo_handling",
            "labels": {},
            "requirements": [
                {"id": "rtg_1", "exclusive": true},
                {"labelKey": "resource_type", "labelValue": "agv", "count": 5, "exclusive": true}
            ],
            "weight": 10.0
        })
    }

    #[test]
    fn test_decode_mixed_requirements() {
        let set: RequirementSet = serde_json::from_value(cargo_handling()).unwrap();

        assert_eq!(set.requirements.len(), 2);
        assert_eq!(set.requirements.first(), Some(&Requirement::by_id("rtg_1", true)));
        assert_eq!(
            set.requirements.get(1),
            Some(&Requirement::by_label("resource_type", "agv", 5, true))
        );
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_exclusive_defaults_to_false() {
        let requirement: Requirement = serde_json::from_value(json!({"id": "rtg_2"})).unwrap();
        assert!(!requirement.exclusive());
        assert_eq!(requirement.count(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_count() {
        let mut set: RequirementSet = serde_json::from_value(cargo_handling()).unwrap();
        set.requirements = vec![Requirement::by_label("resource_type", "agv", 0, true)];
        assert!(matches!(set.validate(), Err(Error::InvalidRequirements { .. })));
    }

    #[test]
    fn test_validate_rejects_nan_weight() {
        let mut set: RequirementSet = serde_json::from_value(cargo_handling()).unwrap();
        set.weight = f64::NAN;
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_requirements() {
        let mut set: RequirementSet = serde_json::from_value(cargo_handling()).unwrap();
        set.requirements.clear();
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_accepts_by_label() {
        let requirement = Requirement::by_label("resource_type", "agv", 3, false);
        assert!(requirement.accepts(&Resource::new("agv_1").with_label("resource_type", "agv")));
        assert!(!requirement.accepts(&Resource::new("rtg_1").with_label("resource_type", "rtg")));
    }
}
