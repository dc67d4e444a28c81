//! Shared engine state.
//!
//! The registry and the allocation table live together behind one write lock
//! so that a registry mutation and the re-evaluation it causes commit as one
//! step. Rules sit behind their own lock; evaluation only ever reads them.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use dispatch_core::{Error, Result};
use dispatch_events::{Message, Resource};

use crate::matcher::{MatchOutcome, RebalanceReport, RequirementMatcher, SetView};
use crate::reaction::{Reaction, ReactionEngine};
use crate::registry::{RegisterOutcome, ResourceRegistry};
use crate::requirements::RequirementSet;
use crate::rules::ReactionRule;

/// Registry plus allocation table, mutated only through `&mut self`.
#[derive(Debug, Default, Clone)]
pub struct FleetState {
    pub registry: ResourceRegistry,
    pub matcher: RequirementMatcher,
}

/// A trigger with the reactions it caused.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub trigger: Message,
    pub reactions: Vec<Reaction>,
}

/// What applying one inbound message changed.
#[derive(Debug, Clone, Default)]
pub struct Applied {
    /// Messages the rules should see: the inbound one, then any derived.
    pub triggers: Vec<Message>,
    /// Sets re-evaluated because the registry changed.
    pub reevaluated: Vec<(String, MatchOutcome)>,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the registry side of a message.
    ///
    /// A registration that changes the registry also yields a derived
    /// `ResourceWithLabelIsAvailable` trigger for the resource. Duplicate
    /// deliveries of the same registration derive nothing.
    pub fn apply(&mut self, message: &Message) -> Applied {
        let mut applied = Applied {
            triggers: vec![message.clone()],
            reevaluated: Vec::new(),
        };

        match message {
            Message::RegisterResource { resource } => {
                if self.register(resource.clone()).is_change() {
                    applied.reevaluated = self.matcher.reevaluate_all(&self.registry);
                    applied
                        .triggers
                        .push(Message::label_available(resource.clone()));
                }
            }
            Message::DeregisterResource { resource } => {
                if self.deregister(resource.id.as_str()).is_some() {
                    applied.reevaluated = self.matcher.reevaluate_all(&self.registry);
                }
            }
            Message::ResourceWithLabelIsAvailable { .. } | Message::CustomMessageContent { .. } => {}
        }

        applied
    }

    pub fn register(&mut self, resource: Resource) -> RegisterOutcome {
        self.registry.register(resource)
    }

    /// Remove a resource and drop it from every allocation holding it.
    pub fn deregister(&mut self, id: &str) -> Option<Resource> {
        let removed = self.registry.deregister(id)?;
        let affected = self.matcher.invalidate_resource(id);
        if !affected.is_empty() {
            info!(resource_id = id, sets = ?affected, "Deregistered resource was allocated");
        }
        Some(removed)
    }

    /// Register or replace a set and evaluate it right away.
    ///
    /// A replacement releases the old allocation, so every set is evaluated
    /// again in priority order to hand the freed resources out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequirements`] if the set fails validation.
    pub fn upsert_requirements(&mut self, set: RequirementSet) -> Result<(bool, MatchOutcome)> {
        let set_id = set.id.clone();
        let replaced = self.matcher.upsert(set)?;
        if !replaced {
            let outcome = self.matcher.evaluate(&set_id, &self.registry)?;
            return Ok((false, outcome));
        }

        self.matcher
            .reevaluate_all(&self.registry)
            .into_iter()
            .find_map(|(id, outcome)| (id == set_id).then_some(outcome))
            .map(|outcome| (true, outcome))
            .ok_or_else(|| Error::unknown_requirement_set(&set_id))
    }

    /// Forget a set, then let the remaining sets claim what it held.
    pub fn remove_requirements(&mut self, set_id: &str) -> Option<RequirementSet> {
        let removed = self.matcher.remove(set_id)?;
        let reevaluated = self.matcher.reevaluate_all(&self.registry);
        debug!(set_id, reevaluated = reevaluated.len(), "Requirement set removed");
        Some(removed)
    }

    pub fn rebalance(&mut self) -> RebalanceReport {
        self.matcher.rebalance(&self.registry)
    }
}

/// Cloneable handle to the engine state.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    fleet: Arc<RwLock<FleetState>>,
    rules: Arc<RwLock<ReactionEngine>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(fleet: FleetState, rules: ReactionEngine) -> Self {
        Self {
            fleet: Arc::new(RwLock::new(fleet)),
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    /// Read access to registry and allocations.
    pub async fn fleet(&self) -> RwLockReadGuard<'_, FleetState> {
        self.fleet.read().await
    }

    pub async fn apply(&self, message: &Message) -> Applied {
        self.fleet.write().await.apply(message)
    }

    /// Apply a message, then evaluate every rule against each trigger it
    /// yields. Conditions see the registry exactly as this message left it,
    /// so messages applied afterwards cannot change the outcome.
    pub async fn handle(&self, message: &Message) -> Vec<Evaluated> {
        let rules = self.rules.read().await;
        let mut fleet = self.fleet.write().await;
        let applied = fleet.apply(message);

        applied
            .triggers
            .into_iter()
            .map(|trigger| {
                let reactions = rules.react(&trigger, &fleet.registry);
                debug!(
                    message_type = %trigger.kind(),
                    reactions = reactions.len(),
                    "Message evaluated"
                );
                Evaluated { trigger, reactions }
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`dispatch_core::Error::InvalidRule`] if the rule fails validation.
    pub async fn register_rule(&self, rule: ReactionRule) -> Result<bool> {
        self.rules.write().await.register(rule)
    }

    pub async fn remove_rule(&self, reaction_id: &str) -> Option<ReactionRule> {
        self.rules.write().await.remove(reaction_id)
    }

    pub async fn rules(&self) -> Vec<ReactionRule> {
        self.rules.read().await.rules().cloned().collect()
    }

    /// # Errors
    ///
    /// Returns [`dispatch_core::Error::InvalidRequirements`] if the set fails validation.
    pub async fn upsert_requirements(&self, set: RequirementSet) -> Result<(bool, MatchOutcome)> {
        self.fleet.write().await.upsert_requirements(set)
    }

    pub async fn remove_requirements(&self, set_id: &str) -> Option<RequirementSet> {
        self.fleet.write().await.remove_requirements(set_id)
    }

    pub async fn requirement_sets(&self) -> Vec<SetView> {
        self.fleet.read().await.matcher.sets()
    }

    pub async fn resources(&self) -> Vec<Resource> {
        self.fleet.read().await.registry.iter().cloned().collect()
    }

    pub async fn rebalance(&self) -> RebalanceReport {
        self.fleet.write().await.rebalance()
    }
}
