//! Submit long-running management operations and wait for their terminal state.

use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::arm::{LroState, ManagementClient};
use crate::error::{AzError, Result};
use crate::locator::ResourceId;

/// Polling cadence for pending operations
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// Abandon the wait after this long. The remote operation keeps running.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            timeout: None,
        }
    }
}

impl PollConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before poll number `attempt`; a server `Retry-After` takes precedence.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(retry_after) = retry_after {
            return retry_after;
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateOrUpdate {
        target: ResourceId,
        document: JsonValue,
    },
    Delete {
        target: ResourceId,
    },
    Start {
        target: ResourceId,
        template: JsonValue,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateOrUpdate { .. } => "create-or-update",
            Operation::Delete { .. } => "delete",
            Operation::Start { .. } => "start",
        }
    }

    pub fn target(&self) -> &ResourceId {
        match self {
            Operation::CreateOrUpdate { target, .. }
            | Operation::Delete { target }
            | Operation::Start { target, .. } => target,
        }
    }
}

pub struct LroExecutor<'a> {
    client: &'a dyn ManagementClient,
    config: PollConfig,
}

impl<'a> LroExecutor<'a> {
    pub fn new(client: &'a dyn ManagementClient, config: PollConfig) -> Self {
        Self { client, config }
    }

    /// Submit once and wait for the terminal state.
    ///
    /// Returns the result document when the backend produces one. Nothing is
    /// resubmitted on failure.
    pub async fn submit(&self, operation: Operation) -> Result<Option<JsonValue>> {
        match self.config.timeout {
            Some(after) => tokio::time::timeout(after, self.run(&operation))
                .await
                .map_err(|_| AzError::TimedOut {
                    operation: format!("{} {}", operation.name(), operation.target().name),
                    after,
                })?,
            None => self.run(&operation).await,
        }
    }

    async fn run(&self, operation: &Operation) -> Result<Option<JsonValue>> {
        tracing::debug!(
            operation = operation.name(),
            target = %operation.target(),
            "submitting operation"
        );

        let mut state = match operation {
            Operation::CreateOrUpdate { target, document } => {
                self.client.begin_create_or_update(target, document).await?
            }
            Operation::Delete { target } => self.client.begin_delete(target).await?,
            Operation::Start { target, template } => {
                self.client.begin_start_job(target, template).await?
            }
        };

        let mut attempt = 0;
        loop {
            match state {
                LroState::Done(result) => {
                    tracing::debug!(
                        operation = operation.name(),
                        polls = attempt,
                        "operation completed"
                    );
                    return Ok(result);
                }
                LroState::Pending(pending) => {
                    let delay = self.config.delay_for_attempt(attempt, pending.retry_after);
                    tracing::debug!(
                        operation = operation.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "operation pending"
                    );
                    tokio::time::sleep(delay).await;
                    state = self.client.poll(&pending).await?;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::fake::FakeClient;
    use crate::arm::{PendingOperation, PollStyle};
    use crate::error::BackendError;
    use crate::locator::ResourceKind;
    use serde_json::json;

    fn pending(retry_after: Option<Duration>) -> LroState {
        LroState::Pending(PendingOperation {
            status_url: "https://management.example.test/operations/1".into(),
            style: PollStyle::AsyncOperation,
            final_url: None,
            retry_after,
        })
    }

    fn app_id() -> ResourceId {
        ResourceId::new("sub-1", "rg1", ResourceKind::ContainerApp, "app1")
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = PollConfig::default();
        assert_eq!(config.delay_for_attempt(0, None), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1, None), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(4, None), Duration::from_secs(16));
        assert_eq!(config.delay_for_attempt(5, None), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(40, None), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let config = PollConfig::default();
        assert_eq!(
            config.delay_for_attempt(3, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_polls_until_done() {
        let client = FakeClient::new("sub-1")
            .with_group("rg1")
            .begin_with(pending(None))
            .poll_with(Ok(pending(Some(Duration::from_secs(3)))))
            .poll_with(Ok(LroState::Done(Some(json!({ "name": "app1" })))));

        let executor = LroExecutor::new(&client, PollConfig::default());
        let result = executor
            .submit(Operation::CreateOrUpdate {
                target: app_id(),
                document: json!({ "location": "East US" }),
            })
            .await
            .unwrap();

        assert_eq!(result, Some(json!({ "name": "app1" })));
        let polls = client.calls().iter().filter(|c| c.starts_with("poll")).count();
        assert_eq!(polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_is_reported_once() {
        let client = FakeClient::new("sub-1")
            .with_resource("rg1", ResourceKind::ContainerApp, "app1", json!({}))
            .begin_with(pending(None))
            .poll_with(Err(BackendError::new(409, "Conflict", "busy").into()));

        let executor = LroExecutor::new(&client, PollConfig::default());
        let err = executor
            .submit(Operation::Delete { target: app_id() })
            .await
            .unwrap_err();

        assert_eq!(err.backend().unwrap().code, "Conflict");
        let deletes = client.calls().iter().filter(|c| c.starts_with("delete")).count();
        assert_eq!(deletes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_wait() {
        let mut client = FakeClient::new("sub-1").begin_with(pending(None));
        for _ in 0..20 {
            client = client.poll_with(Ok(pending(None)));
        }

        let config = PollConfig::default().with_timeout(Some(Duration::from_secs(10)));
        let executor = LroExecutor::new(&client, config);
        let err = executor
            .submit(Operation::Start {
                target: ResourceId::new("sub-1", "rg1", ResourceKind::ContainerAppJob, "job1"),
                template: json!({ "containers": [] }),
            })
            .await
            .unwrap_err();

        assert_eq!(err.category(), "TimedOut");
        assert!(err.to_string().contains("start job1"));
    }
}
