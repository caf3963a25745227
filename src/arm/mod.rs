//! The resource management capability consumed by the orchestration core.

mod client;
mod executions;
#[cfg(test)]
pub(crate) mod fake;

pub use client::{ArmClient, MANAGEMENT_ENDPOINT};
pub use executions::{ExecutionDetailsFetcher, EXECUTION_DETAILS_API_VERSION};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::error::Result;
use crate::locator::{ResourceId, ResourceKind};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// How a pending operation reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStyle {
    /// `Azure-AsyncOperation` status document with a `status` field.
    AsyncOperation,
    /// `Location` URL answering 202 until the operation completes.
    Location,
    /// The resource itself, via `properties.provisioningState`.
    ProvisioningState,
}

/// An accepted operation that has not reached a terminal state yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub status_url: String,
    pub style: PollStyle,
    /// Where the final result is read once the status reports success.
    pub final_url: Option<String>,
    pub retry_after: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LroState {
    /// Terminal success, with the result document when the backend returns one.
    Done(Option<JsonValue>),
    Pending(PendingOperation),
}

/// Abstract access to the management plane.
///
/// Implementations map semantic failures (4xx/5xx) to `AzError::Backend`.
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Base URL of the management endpoint.
    fn endpoint(&self) -> &str;

    async fn default_subscription(&self) -> Result<Subscription>;

    async fn subscription(&self, subscription_id: &str) -> Result<Subscription>;

    /// Resource groups in backend enumeration order.
    async fn resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>>;

    async fn resource_group(&self, subscription_id: &str, name: &str) -> Result<ResourceGroup>;

    async fn exists(&self, id: &ResourceId) -> Result<bool>;

    async fn get(&self, id: &ResourceId) -> Result<JsonValue>;

    async fn list(
        &self,
        subscription_id: &str,
        resource_group: &str,
        kind: ResourceKind,
    ) -> Result<Vec<JsonValue>>;

    async fn begin_create_or_update(&self, id: &ResourceId, document: &JsonValue)
        -> Result<LroState>;

    async fn begin_delete(&self, id: &ResourceId) -> Result<LroState>;

    async fn begin_start_job(&self, job: &ResourceId, template: &JsonValue) -> Result<LroState>;

    async fn poll(&self, operation: &PendingOperation) -> Result<LroState>;

    async fn job_executions(&self, job: &ResourceId) -> Result<Vec<JsonValue>>;

    async fn job_execution(&self, job: &ResourceId, name: &str) -> Result<JsonValue>;

    /// Bearer token for the management audience.
    async fn access_token(&self) -> Result<String>;
}
