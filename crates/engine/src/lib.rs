//! Reaction engine and weighted resource allocator.
//!
//! - **Registry**: the resources currently known and their labels
//! - **Matcher**: allocates requirement sets, preempting lighter holders of
//!   contested exclusive resources
//! - **Reactions**: rules binding message filters to publish or rebalance effects
//! - **Dispatcher**: polls inbound topics, mutates state, evaluates rules, publishes
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dispatch_engine::{Dispatcher, DispatcherConfig, SharedState, ShutdownCoordinator};
//! use dispatch_events::InMemoryBroker;
//!
//! let broker = InMemoryBroker::new_arc();
//! let shutdown = Arc::new(ShutdownCoordinator::new());
//! let config = DispatcherConfig::from(&dispatch_core::DispatchConfig::default());
//! let stats = Dispatcher::new(broker, SharedState::new(), config, shutdown).run().await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod dispatcher;
pub mod matcher;
pub mod reaction;
pub mod registry;
pub mod requirements;
pub mod rules;
pub mod shutdown;
pub mod state;

pub use dispatcher::{DispatchStats, Dispatcher, DispatcherConfig};
pub use matcher::{
    Allocation, AllocationStatus, MatchOutcome, RebalanceReport, RequirementMatcher, SetView,
    Unsatisfied,
};
pub use reaction::{Effect, Reaction, ReactionEngine};
pub use registry::{RegisterOutcome, ResourceRegistry};
pub use requirements::{Requirement, RequirementSet};
pub use rules::{
    Action, BuiltinAction, Condition, ConditionalAction, DirectAction, FilterExpression,
    ReactionRule,
};
pub use shutdown::{ShutdownCoordinator, ShutdownPhase, ShutdownSignal, install_signal_handlers};
pub use state::{Applied, FleetState, SharedState};
