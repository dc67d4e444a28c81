//! Resource registry.
//!
//! Holds every currently known resource and its labels, keyed by id in sorted
//! order so that lookups by label visit resources deterministically.

use std::collections::BTreeMap;

use tracing::debug;

use dispatch_events::{Labels, Resource, ResourceId};

/// What a registration changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The id was not known before.
    Created,
    /// The id was known with different labels.
    Updated { previous: Labels },
    /// The id was known with identical labels.
    Unchanged,
}

impl RegisterOutcome {
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<ResourceId, Resource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource. The incoming labels overwrite the stored ones.
    pub fn register(&mut self, resource: Resource) -> RegisterOutcome {
        let outcome = match self.resources.get(&resource.id) {
            None => RegisterOutcome::Created,
            Some(existing) if existing.labels == resource.labels => RegisterOutcome::Unchanged,
            Some(existing) => RegisterOutcome::Updated {
                previous: existing.labels.clone(),
            },
        };

        debug!(resource_id = %resource.id, ?outcome, "Registering resource");
        self.resources.insert(resource.id.clone(), resource);
        outcome
    }

    /// Remove a resource. Unknown ids are a no-op, since duplicate and late
    /// deregistrations are expected under at-least-once delivery.
    pub fn deregister(&mut self, id: &str) -> Option<Resource> {
        let removed = self.resources.remove(id);
        if removed.is_none() {
            debug!(resource_id = id, "Deregister for unknown resource ignored");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// Lazily yield resources matching `predicate`, in id order.
    ///
    /// The iterator borrows the registry; calling `find` again restarts it.
    pub fn find<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a Resource> + 'a
    where
        P: Fn(&Resource) -> bool + 'a,
    {
        self.resources.values().filter(move |r| predicate(*r))
    }

    /// Resources carrying exactly `key=value`.
    pub fn with_label<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.find(move |r| r.has_label(key, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn agv(n: u32) -> Resource {
        Resource::new(format!("agv_{n}")).with_label("resource_type", "agv")
    }

    #[test]
    fn test_register_reports_created_then_unchanged() {
        let mut registry = ResourceRegistry::new();
        assert_eq!(registry.register(agv(1)), RegisterOutcome::Created);
        assert_eq!(registry.register(agv(1)), RegisterOutcome::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_overwrites_labels() {
        let mut registry = ResourceRegistry::new();
        registry.register(Resource::new("agv_1").with_label("configuration_step", "not_configured"));

        let outcome = registry
            .register(Resource::new("agv_1").with_label("configuration_step", "map_downloaded"));

        assert!(matches!(outcome, RegisterOutcome::Updated { .. }));
        let stored = registry.get("agv_1").unwrap();
        assert!(stored.has_label("configuration_step", "map_downloaded"));
        assert_eq!(stored.labels.len(), 1);
    }

    #[test]
    fn test_deregister_unknown_is_noop() {
        let mut registry = ResourceRegistry::new();
        registry.register(agv(1));

        assert!(registry.deregister("agv_9").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deregister_removes() {
        let mut registry = ResourceRegistry::new();
        registry.register(agv(1));

        assert!(registry.deregister("agv_1").is_some());
        assert!(!registry.contains("agv_1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_is_restartable_and_ordered() {
        let mut registry = ResourceRegistry::new();
        for n in [3, 1, 2] {
            registry.register(agv(n));
        }
        registry.register(Resource::new("rtg_1").with_label("resource_type", "rtg"));

        let first: Vec<&str> = registry
            .with_label("resource_type", "agv")
            .map(|r| r.id.as_str())
            .collect();
        let second = registry.with_label("resource_type", "agv").count();

        assert_eq!(first, vec!["agv_1", "agv_2", "agv_3"]);
        assert_eq!(second, 3);
    }
}
