//! The ingress loop.
//!
//! Each inbound topic is polled independently with a bounded wait. Messages
//! are applied and evaluated in batch order, and one task per trigger delivers
//! the resulting effects. Shutdown stops the polling; delivery tasks run to
//! completion before [`Dispatcher::run`] returns.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use dispatch_core::{DispatchConfig, Error, Result, ResultExt};
use dispatch_events::{Envelope, Message, Transport};

use crate::reaction::{Effect, Reaction};
use crate::shutdown::ShutdownCoordinator;
use crate::state::SharedState;

/// Loop settings, usually taken from [`DispatchConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub inbound_topics: Vec<String>,
    pub poll_timeout: Duration,
    pub report_topic: String,
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            inbound_topics: config.broker.inbound_topics.clone(),
            poll_timeout: config.broker.poll_timeout(),
            report_topic: config.engine.report_topic.clone(),
        }
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Polls that returned, one per topic per wait.
    pub polls: u64,
    pub envelopes: u64,
    pub malformed: u64,
    pub triggers: u64,
    pub reactions: u64,
    pub published: u64,
    pub rebalances: u64,
}

#[derive(Debug, Default)]
struct TaskTally {
    reactions: u64,
    published: u64,
    rebalances: u64,
}

impl DispatchStats {
    fn absorb(&mut self, tally: &TaskTally) {
        self.reactions += tally.reactions;
        self.published += tally.published;
        self.rebalances += tally.rebalances;
    }
}

pub struct Dispatcher<T: Transport + 'static> {
    transport: Arc<T>,
    state: SharedState,
    config: DispatcherConfig,
    shutdown: Arc<ShutdownCoordinator>,
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub const fn new(
        transport: Arc<T>,
        state: SharedState,
        config: DispatcherConfig,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            transport,
            state,
            config,
            shutdown,
        }
    }

    /// Run until shutdown is initiated or the transport fails.
    ///
    /// Every inbound topic has its own poll in flight, and a batch is handled
    /// as soon as its poll returns. Shutdown stops issuing polls. A poll still
    /// waiting holds no envelopes, so dropping it loses nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportUnavailable`] when polling or publishing fails.
    /// Evaluations already spawned are awaited before the error is returned.
    pub async fn run(self) -> Result<DispatchStats> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut tasks: JoinSet<Result<TaskTally>> = JoinSet::new();
        let mut stats = DispatchStats::default();
        let mut failure: Option<Error> = None;

        info!(topics = ?self.config.inbound_topics, "Dispatcher started");

        let mut polls: FuturesUnordered<_> = self
            .config
            .inbound_topics
            .iter()
            .map(|topic| self.poll_topic(topic))
            .collect();

        while failure.is_none() && !self.shutdown.is_shutdown_initiated() {
            let (topic, polled) = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                next = polls.next() => match next {
                    Some(polled) => polled,
                    None => break,
                },
            };
            stats.polls += 1;

            match polled {
                Ok(batch) => {
                    self.handle_batch(batch, &mut tasks, &mut stats).await;
                    polls.push(self.poll_topic(topic));
                }
                Err(e) => {
                    error!(topic, error = %e, "Poll failed, stopping dispatcher");
                    failure.get_or_insert(e);
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                record(joined, &mut stats, &mut failure);
            }
        }
        drop(polls);

        info!(in_flight = tasks.len(), "Dispatcher draining in-flight evaluations");
        while let Some(joined) = tasks.join_next().await {
            record(joined, &mut stats, &mut failure);
        }
        self.shutdown.mark_complete().await;

        info!(?stats, "Dispatcher stopped");
        failure.map_or(Ok(stats), Err)
    }

    async fn poll_topic<'a>(&self, topic: &'a str) -> (&'a str, Result<Vec<Envelope>>) {
        (topic, self.transport.poll(topic, self.config.poll_timeout).await)
    }

    /// Apply and evaluate envelopes in order. Only delivering the effects is
    /// left to the spawned tasks.
    async fn handle_batch(
        &self,
        batch: Vec<Envelope>,
        tasks: &mut JoinSet<Result<TaskTally>>,
        stats: &mut DispatchStats,
    ) {
        for envelope in batch {
            stats.envelopes += 1;
            let Some(message) = Message::from_value(envelope.payload)
                .inspect_error(|_| stats.malformed += 1)
                .into_option_logged()
            else {
                continue;
            };
            debug!(topic = %envelope.topic, key = %envelope.key, kind = %message.kind(), "Message received");

            for evaluated in self.state.handle(&message).await {
                stats.triggers += 1;
                tasks.spawn(deliver(
                    Arc::clone(&self.transport),
                    self.state.clone(),
                    self.config.report_topic.clone(),
                    evaluated.reactions,
                ));
            }
        }
    }
}

fn record(
    joined: std::result::Result<Result<TaskTally>, JoinError>,
    stats: &mut DispatchStats,
    failure: &mut Option<Error>,
) {
    match joined {
        Ok(Ok(tally)) => stats.absorb(&tally),
        Ok(Err(e)) => {
            error!(error = %e, "Evaluation could not deliver its effects");
            failure.get_or_insert(e);
        }
        Err(e) => warn!(error = %e, "Evaluation task did not finish"),
    }
}

async fn deliver<T: Transport + 'static>(
    transport: Arc<T>,
    state: SharedState,
    report_topic: String,
    reactions: Vec<Reaction>,
) -> Result<TaskTally> {
    let mut tally = TaskTally::default();
    for reaction in reactions {
        tally.reactions += 1;
        perform(transport.as_ref(), &state, &report_topic, reaction, &mut tally).await?;
    }
    Ok(tally)
}

async fn perform<T: Transport>(
    transport: &T,
    state: &SharedState,
    report_topic: &str,
    reaction: Reaction,
    tally: &mut TaskTally,
) -> Result<()> {
    let Reaction {
        reaction_id,
        effect,
    } = reaction;

    match effect {
        Effect::Publish { topic, message } => {
            let key = transport.send(&topic, serde_json::to_value(&message)?).await?;
            info!(reaction_id = %reaction_id, topic = %topic, key = %key, "Action published");
            tally.published += 1;
        }
        Effect::KeepHighestWeightFunctionalities => {
            let report = state.rebalance().await;
            info!(
                reaction_id = %reaction_id,
                satisfied = report.satisfied.len(),
                unsatisfied = report.unsatisfied.len(),
                "Allocations rebalanced"
            );
            transport
                .send(report_topic, serde_json::to_value(&report)?)
                .await?;
            tally.rebalances += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_config_from_dispatch_config() {
        let config = DispatcherConfig::from(&DispatchConfig::default());
        assert_eq!(config.inbound_topics, vec!["resources-topic-1".to_string()]);
        assert_eq!(config.poll_timeout, Duration::from_millis(1000));
        assert_eq!(config.report_topic, "functionalities");
    }

    #[test]
    fn test_stats_absorb() {
        let mut stats = DispatchStats::default();
        stats.absorb(&TaskTally {
            reactions: 2,
            published: 1,
            rebalances: 1,
        });
        assert_eq!(stats.reactions, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.rebalances, 1);
    }
}
