//! HTTP client for a running dispatch service.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use dispatch_events::Envelope;

#[derive(Debug, Clone)]
pub struct DispatchClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    key: String,
}

impl DispatchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a reaction rule; returns the response body.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or rejects the document.
    pub async fn post_reaction(&self, rule: &Value) -> Result<Value> {
        self.post_json("/reaction-model", rule).await
    }

    /// POST a requirement set; returns the response body.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or rejects the document.
    pub async fn post_requirements(&self, set: &Value) -> Result<Value> {
        self.post_json("/requirements-model", set).await
    }

    /// # Errors
    ///
    /// Fails when the service is unreachable or answers with an error status.
    pub async fn requirement_sets(&self) -> Result<Value> {
        self.get_json("/requirements-model").await
    }

    /// # Errors
    ///
    /// Fails when the service is unreachable or answers with an error status.
    pub async fn resources(&self) -> Result<Value> {
        self.get_json("/resources").await
    }

    /// Publish a message under a random key, returning the key.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or the broker refuses the message.
    pub async fn publish(&self, topic: &str, message: &Value) -> Result<String> {
        let body = self.post_json(&format!("/topics/{topic}/messages"), message).await?;
        let response: PublishResponse =
            serde_json::from_value(body).context("Unexpected publish response")?;
        debug!(topic, key = %response.key, "Published");
        Ok(response.key)
    }

    /// One bounded poll.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or answers with an error status.
    pub async fn poll(&self, topic: &str, timeout: Duration) -> Result<Vec<Envelope>> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let response = self
            .http
            .get(self.url(&format!("/topics/{topic}/messages")))
            .query(&[("timeout_ms", timeout_ms)])
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        Self::check(response)
            .await?
            .json::<Vec<Envelope>>()
            .await
            .context("Unexpected poll response")
    }

    /// Poll `topic` until a payload satisfies `wanted` or `timeout` elapses.
    /// Payloads that do not match are dropped.
    ///
    /// # Errors
    ///
    /// Fails when polling fails. Running out of time is `Ok(None)`.
    pub async fn wait_for<P>(&self, topic: &str, timeout: Duration, wanted: P) -> Result<Option<Value>>
    where
        P: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let batch = self.poll(topic, remaining).await?;
            if let Some(found) = batch.into_iter().map(|e| e.payload).find(|p| wanted(p)) {
                return Ok(Some(found));
            }
        }
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        Self::check(response)
            .await?
            .json::<Value>()
            .await
            .context("Response was not JSON")
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        Self::check(response)
            .await?
            .json::<Value>()
            .await
            .context("Response was not JSON")
    }

    /// Turn an error status into an error carrying the problem detail.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();
        bail!("Service answered {status}: {detail}")
    }
}
