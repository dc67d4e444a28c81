//! Topic transport for ingress and egress.
//!
//! The engine only needs two operations from a message bus: a bounded poll
//! of pending envelopes on one topic, and a fire-and-forget publish.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace};

use dispatch_core::{Error, Result};

/// Default cap on envelopes returned by one poll.
pub const DEFAULT_MAX_BATCH: usize = 500;

/// A message on a topic, keyed for partitioning only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    /// Opaque unique key (random UUID), never used for business logic.
    pub key: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Envelope {
    /// Create an envelope with a fresh random key.
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::with_key(topic, uuid::Uuid::new_v4().to_string(), payload)
    }

    pub fn with_key(
        topic: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            payload,
            published_at: Utc::now(),
        }
    }
}

/// Ingress/egress adapter over a message bus.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Pull pending envelopes from `topic`, waiting at most `max_wait`.
    ///
    /// Returns an empty batch on timeout rather than waiting forever.
    async fn poll(&self, topic: &str, max_wait: Duration) -> Result<Vec<Envelope>>;

    /// Publish one envelope. No delivery confirmation.
    async fn publish(&self, envelope: Envelope) -> Result<()>;

    /// Publish a payload under a fresh random key, returning the key.
    async fn send(&self, topic: &str, payload: serde_json::Value) -> Result<String> {
        let envelope = Envelope::new(topic, payload);
        let key = envelope.key.clone();
        self.publish(envelope).await?;
        Ok(key)
    }
}

#[derive(Default)]
struct TopicQueue {
    pending: Mutex<VecDeque<Envelope>>,
    notify: Notify,
}

/// In-process topic broker.
///
/// Each topic is a FIFO queue; a poll drains up to `max_batch` envelopes, so
/// concurrent pollers of one topic behave like members of one consumer group.
pub struct InMemoryBroker {
    topics: RwLock<HashMap<String, Arc<TopicQueue>>>,
    max_batch: usize,
    closed: AtomicBool,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create a broker with the default batch size.
    pub fn new() -> Self {
        Self::with_max_batch(DEFAULT_MAX_BATCH)
    }

    pub fn with_max_batch(max_batch: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            max_batch: max_batch.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a new broker wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    async fn queue(&self, topic: &str) -> Arc<TopicQueue> {
        {
            let topics = self.topics.read().await;
            if let Some(queue) = topics.get(topic) {
                return Arc::clone(queue);
            }
        }

        let mut topics = self.topics.write().await;
        Arc::clone(topics.entry(topic.to_string()).or_default())
    }

    /// Number of envelopes waiting on a topic.
    pub async fn pending(&self, topic: &str) -> usize {
        let topics = self.topics.read().await;
        match topics.get(topic) {
            Some(queue) => queue.pending.lock().await.len(),
            None => 0,
        }
    }

    /// Names of every topic seen so far, sorted.
    pub async fn topics(&self) -> Vec<String> {
        let topics = self.topics.read().await;
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop accepting publishes and wake every waiting poller.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let topics = self.topics.read().await;
        for queue in topics.values() {
            queue.notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, topic: &str) -> Result<()> {
        if self.is_closed() {
            Err(Error::transport_unavailable(topic, "broker closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn poll(&self, topic: &str, max_wait: Duration) -> Result<Vec<Envelope>> {
        self.ensure_open(topic)?;
        let queue = self.queue(topic).await;
        // A wait too long to represent has no deadline.
        let deadline = Instant::now().checked_add(max_wait);

        loop {
            let notified = queue.notify.notified();
            {
                let mut pending = queue.pending.lock().await;
                if !pending.is_empty() {
                    let take = pending.len().min(self.max_batch);
                    return Ok(pending.drain(..take).collect());
                }
            }

            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
                None => notified.await,
            }
            self.ensure_open(topic)?;
        }
    }

    async fn publish(&self, envelope: Envelope) -> Result<()> {
        self.ensure_open(&envelope.topic)?;
        let queue = self.queue(&envelope.topic).await;
        queue.pending.lock().await.push_back(envelope);
        queue.notify.notify_one();
        Ok(())
    }
}

/// A wrapper that adds tracing to a transport.
pub struct TracingTransport<T: Transport> {
    inner: T,
}

impl<T: Transport> TracingTransport<T> {
    /// Create a new tracing transport.
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for TracingTransport<T> {
    async fn poll(&self, topic: &str, max_wait: Duration) -> Result<Vec<Envelope>> {
        trace!(topic, max_wait_ms = max_wait.as_millis(), "Polling topic");
        let result = self.inner.poll(topic, max_wait).await;
        match &result {
            Ok(batch) if !batch.is_empty() => {
                debug!(topic, count = batch.len(), "Polled envelopes");
            }
            Ok(_) => {}
            Err(e) => debug!(topic, error = %e, "Poll failed"),
        }
        result
    }

    async fn publish(&self, envelope: Envelope) -> Result<()> {
        debug!(topic = %envelope.topic, key = %envelope.key, "Publishing envelope");
        self.inner.publish(envelope).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn poll(&self, topic: &str, max_wait: Duration) -> Result<Vec<Envelope>> {
        (**self).poll(topic, max_wait).await
    }

    async fn publish(&self, envelope: Envelope) -> Result<()> {
        (**self).publish(envelope).await
    }
}
