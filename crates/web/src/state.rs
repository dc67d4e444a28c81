//! Shared handler state.

use std::sync::Arc;
use std::time::Duration;

use dispatch_core::BrokerConfig;
use dispatch_engine::SharedState;
use dispatch_events::Transport;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedState,
    pub transport: Arc<dyn Transport>,
    pub broker: Arc<BrokerConfig>,
}

impl AppState {
    pub fn new(engine: SharedState, transport: Arc<dyn Transport>, broker: BrokerConfig) -> Self {
        Self {
            engine,
            transport,
            broker: Arc::new(broker),
        }
    }

    /// Poll wait for an HTTP request, capped by configuration.
    pub fn poll_wait(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms
            .map_or_else(|| self.broker.poll_timeout(), Duration::from_millis)
            .min(self.broker.max_http_poll())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_events::InMemoryBroker;

    #[test]
    fn test_poll_wait_is_capped() {
        let broker = BrokerConfig {
            max_http_poll_ms: 2_000,
            ..BrokerConfig::default()
        };
        let state = AppState::new(SharedState::new(), InMemoryBroker::new_arc(), broker);

        assert_eq!(state.poll_wait(Some(500)), Duration::from_millis(500));
        assert_eq!(state.poll_wait(Some(90_000)), Duration::from_secs(2));
        assert_eq!(state.poll_wait(None), Duration::from_millis(1_000));
    }
}
