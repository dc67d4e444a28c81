//! Requirement matcher.
//!
//! Allocates registry resources to requirement sets. Exclusive claims may not
//! share a resource with any other set; shared claims may not use a resource
//! someone holds exclusively. A blocking holder is preempted only when its
//! weight is strictly lower than the requester's, so equal weights keep the
//! earlier allocation. A preempted set loses its whole allocation.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use dispatch_core::{Error, Result};
use dispatch_events::{Labels, ResourceId};

use crate::registry::ResourceRegistry;
use crate::requirements::{Requirement, RequirementSet};

/// Resources reserved for a set, one list per requirement in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Allocation {
    per_requirement: Vec<Vec<ResourceId>>,
}

impl Allocation {
    /// Resources reserved for requirement `index`.
    pub fn for_requirement(&self, index: usize) -> &[ResourceId] {
        self.per_requirement
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.per_requirement.iter().flatten()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources().any(|r| r.as_str() == id)
    }

    pub fn len(&self) -> usize {
        self.per_requirement.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop one resource, returning the requirement index it served.
    fn remove(&mut self, id: &str) -> Option<usize> {
        self.per_requirement.iter_mut().enumerate().find_map(|(index, ids)| {
            let before = ids.len();
            ids.retain(|r| r.as_str() != id);
            (ids.len() != before).then_some(index)
        })
    }

    /// Exclusive flag of the requirement holding `id`.
    fn holds_exclusively(&self, id: &ResourceId, set: &RequirementSet) -> Option<bool> {
        self.per_requirement
            .iter()
            .zip(&set.requirements)
            .find(|(ids, _)| ids.contains(id))
            .map(|(_, requirement)| requirement.exclusive())
    }
}

/// Where a requirement set stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AllocationStatus {
    /// Registered, not yet evaluated.
    Pending,
    /// Every requirement holds its resources.
    Satisfied,
    /// The last evaluation could not fill `requirement`.
    Unsatisfied { requirement: usize, reason: String },
    /// A held resource was deregistered.
    Invalidated { resource: ResourceId },
    /// A higher-weight set took the allocation.
    Preempted { by: String },
}

/// Report for a requirement that could not be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unsatisfied {
    pub set_id: String,
    pub requirement: usize,
    pub description: String,
    pub needed: usize,
    pub available: usize,
}

impl std::fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requirement {} of '{}' ({}): needed {}, claimable {}",
            self.requirement, self.set_id, self.description, self.needed, self.available
        )
    }
}

/// Result of evaluating one requirement set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MatchOutcome {
    Allocated {
        allocation: Allocation,
        preempted: Vec<String>,
    },
    Unsatisfied(Unsatisfied),
}

impl MatchOutcome {
    pub const fn is_allocated(&self) -> bool {
        matches!(self, Self::Allocated { .. })
    }
}

/// Read-only view of a set for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetView {
    pub id: String,
    pub labels: Labels,
    pub weight: f64,
    pub status: AllocationStatus,
    pub allocation: Allocation,
}

/// Outcome of releasing everything and allocating in weight order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebalanceReport {
    pub satisfied: Vec<String>,
    pub unsatisfied: Vec<Unsatisfied>,
}

#[derive(Debug, Clone)]
struct Entry {
    set: RequirementSet,
    seq: u64,
    allocation: Allocation,
    status: AllocationStatus,
}

/// Someone else's hold on a resource.
#[derive(Debug, Clone)]
struct Hold<'a> {
    set_id: &'a str,
    weight: f64,
    exclusive: bool,
}

/// How a candidate resource could be claimed.
#[derive(Debug, Clone)]
enum Claim {
    /// Already held by the requesting set.
    Own,
    Free,
    /// Claimable by preempting `victims`, the heaviest of which weighs `weight`.
    Preempt { weight: f64, victims: Vec<String> },
}

impl Claim {
    const fn tier(&self) -> u8 {
        match self {
            Self::Own => 0,
            Self::Free => 1,
            Self::Preempt { .. } => 2,
        }
    }

    const fn cost(&self) -> f64 {
        match self {
            Self::Own | Self::Free => 0.0,
            Self::Preempt { weight, .. } => *weight,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RequirementMatcher {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

impl RequirementMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a set. A replacement keeps its registration order
    /// but releases its allocation: the old resources were claimed for
    /// requirements that may no longer exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequirements`] if the set fails validation.
    pub fn upsert(&mut self, set: RequirementSet) -> Result<bool> {
        set.validate()?;

        if let Some(entry) = self.entries.get_mut(&set.id) {
            debug!(set_id = %set.id, weight = set.weight, "Replacing requirement set");
            entry.set = set;
            entry.allocation = Allocation::default();
            entry.status = AllocationStatus::Pending;
            return Ok(true);
        }

        debug!(set_id = %set.id, weight = set.weight, "Registering requirement set");
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.entries.insert(
            set.id.clone(),
            Entry {
                set,
                seq,
                allocation: Allocation::default(),
                status: AllocationStatus::Pending,
            },
        );
        Ok(false)
    }

    /// Forget a set and release its allocation.
    pub fn remove(&mut self, set_id: &str) -> Option<RequirementSet> {
        self.entries.remove(set_id).map(|entry| entry.set)
    }

    pub fn status(&self, set_id: &str) -> Option<&AllocationStatus> {
        self.entries.get(set_id).map(|entry| &entry.status)
    }

    pub fn allocation(&self, set_id: &str) -> Option<&Allocation> {
        self.entries.get(set_id).map(|entry| &entry.allocation)
    }

    /// Sets currently holding `resource_id`, sorted.
    pub fn holders(&self, resource_id: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.allocation.contains(resource_id))
            .map(|(id, _)| id.as_str())
            .sorted()
            .collect()
    }

    /// Every set, heaviest first.
    pub fn sets(&self) -> Vec<SetView> {
        self.priority_order()
            .into_iter()
            .filter_map(|id| self.entries.get(&id))
            .map(|entry| SetView {
                id: entry.set.id.clone(),
                labels: entry.set.labels.clone(),
                weight: entry.set.weight,
                status: entry.status.clone(),
                allocation: entry.allocation.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Try to satisfy a set against the registry.
    ///
    /// On success the allocation is committed and every preempted set loses
    /// its allocation. On failure nothing is reserved or released; the set
    /// keeps what it held and its status records the unsatisfied requirement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequirementSet`] if the set was never registered.
    pub fn evaluate(&mut self, set_id: &str, registry: &ResourceRegistry) -> Result<MatchOutcome> {
        let planned = {
            let entry = self
                .entries
                .get(set_id)
                .ok_or_else(|| Error::unknown_requirement_set(set_id))?;
            self.plan(entry, registry)
        };

        match planned {
            Ok((allocation, victims)) => {
                let preempted: Vec<String> = victims.into_iter().collect();
                for victim in &preempted {
                    if let Some(entry) = self.entries.get_mut(victim) {
                        info!(set_id = %victim, by = set_id, "Requirement set preempted");
                        entry.allocation = Allocation::default();
                        entry.status = AllocationStatus::Preempted {
                            by: set_id.to_string(),
                        };
                    }
                }

                if let Some(entry) = self.entries.get_mut(set_id) {
                    debug!(set_id, resources = allocation.len(), "Allocation committed");
                    entry.allocation = allocation.clone();
                    entry.status = AllocationStatus::Satisfied;
                }

                Ok(MatchOutcome::Allocated {
                    allocation,
                    preempted,
                })
            }
            Err(unsatisfied) => {
                if let Some(entry) = self.entries.get_mut(set_id) {
                    debug!(set_id, %unsatisfied, "Requirement set unsatisfied");
                    entry.status = AllocationStatus::Unsatisfied {
                        requirement: unsatisfied.requirement,
                        reason: unsatisfied.to_string(),
                    };
                }
                Ok(MatchOutcome::Unsatisfied(unsatisfied))
            }
        }
    }

    /// Remove one resource from every allocation holding it. Other members of
    /// those allocations stay reserved. Returns the affected set ids.
    pub fn invalidate_resource(&mut self, resource_id: &str) -> Vec<String> {
        let mut affected: Vec<String> = self
            .entries
            .iter_mut()
            .filter_map(|(id, entry)| {
                entry.allocation.remove(resource_id).map(|_| {
                    entry.status = AllocationStatus::Invalidated {
                        resource: ResourceId::new(resource_id),
                    };
                    id.clone()
                })
            })
            .collect();
        affected.sort();

        if !affected.is_empty() {
            debug!(resource_id, sets = ?affected, "Allocations invalidated");
        }
        affected
    }

    /// Evaluate every set, heaviest first, registration order breaking ties.
    pub fn reevaluate_all(&mut self, registry: &ResourceRegistry) -> Vec<(String, MatchOutcome)> {
        self.priority_order()
            .into_iter()
            .filter_map(|id| {
                self.evaluate(&id, registry)
                    .ok()
                    .map(|outcome| (id, outcome))
            })
            .collect()
    }

    /// Release every allocation, then allocate heaviest first.
    pub fn rebalance(&mut self, registry: &ResourceRegistry) -> RebalanceReport {
        for entry in self.entries.values_mut() {
            entry.allocation = Allocation::default();
            entry.status = AllocationStatus::Pending;
        }

        let report = self.reevaluate_all(registry).into_iter().fold(
            RebalanceReport::default(),
            |mut report, (id, outcome)| {
                match outcome {
                    MatchOutcome::Allocated { .. } => report.satisfied.push(id),
                    MatchOutcome::Unsatisfied(unsatisfied) => report.unsatisfied.push(unsatisfied),
                }
                report
            },
        );

        info!(
            satisfied = report.satisfied.len(),
            unsatisfied = report.unsatisfied.len(),
            "Allocations rebalanced"
        );
        report
    }

    fn priority_order(&self) -> Vec<String> {
        self.entries
            .iter()
            .sorted_by(|(_, a), (_, b)| {
                b.set
                    .weight
                    .total_cmp(&a.set.weight)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Holds of every other set, by resource.
    fn holds_excluding<'a>(&'a self, set_id: &str) -> HashMap<&'a ResourceId, Vec<Hold<'a>>> {
        let mut holds: HashMap<&ResourceId, Vec<Hold<'_>>> = HashMap::new();
        for (id, entry) in self.entries.iter().filter(|(id, _)| id.as_str() != set_id) {
            for resource in entry.allocation.resources() {
                let exclusive = entry
                    .allocation
                    .holds_exclusively(resource, &entry.set)
                    .unwrap_or(false);
                holds.entry(resource).or_default().push(Hold {
                    set_id: id.as_str(),
                    weight: entry.set.weight,
                    exclusive,
                });
            }
        }
        holds
    }

    /// Work out an allocation without changing anything.
    fn plan(
        &self,
        entry: &Entry,
        registry: &ResourceRegistry,
    ) -> std::result::Result<(Allocation, BTreeSet<String>), Unsatisfied> {
        let weight = entry.set.weight;
        let holds = self.holds_excluding(&entry.set.id);
        let own: HashSet<&ResourceId> = entry.allocation.resources().collect();

        let mut picked: HashSet<ResourceId> = HashSet::new();
        let mut victims: BTreeSet<String> = BTreeSet::new();
        let mut per_requirement = Vec::with_capacity(entry.set.requirements.len());

        for (index, requirement) in entry.set.requirements.iter().enumerate() {
            let candidates: Vec<(Claim, &ResourceId)> = registry
                .find(|resource| requirement.accepts(resource))
                .filter(|resource| !picked.contains(&resource.id))
                .filter_map(|resource| {
                    classify(
                        &resource.id,
                        requirement,
                        weight,
                        holds
                            .get(&resource.id)
                            .map(Vec::as_slice)
                            .unwrap_or_default(),
                        own.contains(&resource.id),
                        &victims,
                    )
                    .map(|claim| (claim, &resource.id))
                })
                .sorted_by(|(a, a_id), (b, b_id)| {
                    a.tier()
                        .cmp(&b.tier())
                        .then(a.cost().total_cmp(&b.cost()))
                        .then_with(|| a_id.cmp(b_id))
                })
                .collect();

            let needed = requirement.count();
            if candidates.len() < needed {
                return Err(Unsatisfied {
                    set_id: entry.set.id.clone(),
                    requirement: index,
                    description: requirement.describe(),
                    needed,
                    available: candidates.len(),
                });
            }

            let chosen: Vec<ResourceId> = candidates
                .into_iter()
                .take(needed)
                .map(|(claim, id)| {
                    if let Claim::Preempt { victims: losers, .. } = claim {
                        victims.extend(losers);
                    }
                    id.clone()
                })
                .collect();

            picked.extend(chosen.iter().cloned());
            per_requirement.push(chosen);
        }

        Ok((Allocation { per_requirement }, victims))
    }
}

/// Decide whether a resource can be claimed, and at what cost.
fn classify(
    resource_id: &ResourceId,
    requirement: &Requirement,
    weight: f64,
    holds: &[Hold<'_>],
    own: bool,
    already_preempted: &BTreeSet<String>,
) -> Option<Claim> {
    let blockers: Vec<&Hold<'_>> = holds
        .iter()
        .filter(|hold| !already_preempted.contains(hold.set_id))
        .filter(|hold| requirement.exclusive() || hold.exclusive)
        .collect();

    if blockers.is_empty() {
        return Some(if own { Claim::Own } else { Claim::Free });
    }

    if blockers
        .iter()
        .any(|hold| hold.weight.total_cmp(&weight) != Ordering::Less)
    {
        debug!(resource_id = %resource_id, "Resource blocked by equal or heavier holder");
        return None;
    }

    let heaviest = blockers
        .iter()
        .map(|hold| hold.weight)
        .fold(f64::NEG_INFINITY, f64::max);
    Some(Claim::Preempt {
        weight: heaviest,
        victims: blockers.iter().map(|hold| hold.set_id.to_string()).collect(),
    })
}
