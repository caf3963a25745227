//! In-memory `ManagementClient` used by unit tests.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{LroState, ManagementClient, PendingOperation, ResourceGroup, Subscription};
use crate::error::{AzError, BackendError, Result};
use crate::locator::{ResourceId, ResourceKind};

pub(crate) struct FakeClient {
    subscription_id: String,
    groups: Vec<String>,
    resources: Mutex<Vec<(ResourceId, JsonValue)>>,
    executions: Mutex<Vec<(String, JsonValue)>>,
    begin: Mutex<VecDeque<LroState>>,
    polls: Mutex<VecDeque<Result<LroState>>>,
    submitted: Mutex<Vec<(&'static str, ResourceId, Option<JsonValue>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeClient {
    pub(crate) fn new(subscription_id: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            groups: Vec::new(),
            resources: Mutex::new(Vec::new()),
            executions: Mutex::new(Vec::new()),
            begin: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_group(mut self, name: &str) -> Self {
        self.groups.push(name.to_string());
        self
    }

    /// Add a resource to `group` in the default subscription.
    pub(crate) fn with_resource(
        self,
        group: &str,
        kind: ResourceKind,
        name: &str,
        document: JsonValue,
    ) -> Self {
        let id = ResourceId::new(self.subscription_id.clone(), group, kind, name);
        let mut document = document;
        if let Some(map) = document.as_object_mut() {
            map.insert("id".into(), json!(id.path()));
            map.insert("name".into(), json!(name));
        }
        self.resources.lock().unwrap().push((id, document));
        self
    }

    pub(crate) fn with_execution(self, job: &str, execution: JsonValue) -> Self {
        self.executions
            .lock()
            .unwrap()
            .push((job.to_string(), execution));
        self
    }

    /// Next `begin_*` call answers with `state` instead of completing inline.
    pub(crate) fn begin_with(self, state: LroState) -> Self {
        self.begin.lock().unwrap().push_back(state);
        self
    }

    pub(crate) fn poll_with(self, outcome: Result<LroState>) -> Self {
        self.polls.lock().unwrap().push_back(outcome);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn submitted(&self) -> Vec<(&'static str, ResourceId, Option<JsonValue>)> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, id: &ResourceId) -> Option<JsonValue> {
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, doc)| doc.clone())
    }

    fn next_begin(&self, inline: LroState) -> LroState {
        self.begin.lock().unwrap().pop_front().unwrap_or(inline)
    }
}

#[async_trait]
impl ManagementClient for FakeClient {
    fn endpoint(&self) -> &str {
        "https://management.example.test"
    }

    async fn default_subscription(&self) -> Result<Subscription> {
        self.record("default_subscription".into());
        Ok(Subscription {
            subscription_id: self.subscription_id.clone(),
            display_name: Some("default".into()),
        })
    }

    async fn subscription(&self, subscription_id: &str) -> Result<Subscription> {
        self.record(format!("subscription {}", subscription_id));
        if subscription_id == self.subscription_id {
            Ok(Subscription {
                subscription_id: subscription_id.to_string(),
                display_name: None,
            })
        } else {
            Err(BackendError::new(
                404,
                "SubscriptionNotFound",
                format!("The subscription '{}' could not be found.", subscription_id),
            )
            .into())
        }
    }

    async fn resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>> {
        self.record(format!("resource_groups {}", subscription_id));
        Ok(self
            .groups
            .iter()
            .map(|name| ResourceGroup {
                name: name.clone(),
                location: Some("eastus".into()),
            })
            .collect())
    }

    async fn resource_group(&self, subscription_id: &str, name: &str) -> Result<ResourceGroup> {
        self.record(format!("resource_group {}/{}", subscription_id, name));
        self.groups
            .iter()
            .find(|g| g.as_str() == name)
            .map(|g| ResourceGroup {
                name: g.clone(),
                location: Some("eastus".into()),
            })
            .ok_or_else(|| {
                BackendError::new(
                    404,
                    "ResourceGroupNotFound",
                    format!("Resource group '{}' could not be found.", name),
                )
                .into()
            })
    }

    async fn exists(&self, id: &ResourceId) -> Result<bool> {
        self.record(format!("exists {}/{}", id.resource_group, id.name));
        Ok(self.find(id).is_some())
    }

    async fn get(&self, id: &ResourceId) -> Result<JsonValue> {
        self.record(format!("get {}/{}", id.resource_group, id.name));
        self.find(id)
            .ok_or_else(|| BackendError::not_found(&id.name).into())
    }

    async fn list(
        &self,
        subscription_id: &str,
        resource_group: &str,
        kind: ResourceKind,
    ) -> Result<Vec<JsonValue>> {
        self.record(format!("list {}", resource_group));
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| {
                id.subscription_id == subscription_id
                    && id.resource_group == resource_group
                    && id.kind == kind
            })
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn begin_create_or_update(
        &self,
        id: &ResourceId,
        document: &JsonValue,
    ) -> Result<LroState> {
        self.record(format!("put {}/{}", id.resource_group, id.name));
        self.submitted
            .lock()
            .unwrap()
            .push(("put", id.clone(), Some(document.clone())));

        let mut stored = document.clone();
        if let Some(map) = stored.as_object_mut() {
            map.insert("id".into(), json!(id.path()));
            map.insert("name".into(), json!(id.name));
        }
        {
            let mut resources = self.resources.lock().unwrap();
            resources.retain(|(existing, _)| existing != id);
            resources.push((id.clone(), stored.clone()));
        }
        Ok(self.next_begin(LroState::Done(Some(stored))))
    }

    async fn begin_delete(&self, id: &ResourceId) -> Result<LroState> {
        self.record(format!("delete {}/{}", id.resource_group, id.name));
        self.submitted.lock().unwrap().push(("delete", id.clone(), None));
        let removed = {
            let mut resources = self.resources.lock().unwrap();
            let before = resources.len();
            resources.retain(|(existing, _)| existing != id);
            before != resources.len()
        };
        if !removed {
            return Err(BackendError::not_found(&id.name).into());
        }
        Ok(self.next_begin(LroState::Done(None)))
    }

    async fn begin_start_job(&self, job: &ResourceId, template: &JsonValue) -> Result<LroState> {
        self.record(format!("start {}/{}", job.resource_group, job.name));
        self.submitted
            .lock()
            .unwrap()
            .push(("start", job.clone(), Some(template.clone())));
        Ok(self.next_begin(LroState::Done(Some(json!({
            "id": format!("{}/executions/{}-exec", job.path(), job.name),
            "name": format!("{}-exec", job.name),
        })))))
    }

    async fn poll(&self, operation: &PendingOperation) -> Result<LroState> {
        self.record(format!("poll {}", operation.status_url));
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(LroState::Done(None)))
    }

    async fn job_executions(&self, job: &ResourceId) -> Result<Vec<JsonValue>> {
        self.record(format!("executions {}", job.name));
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, _)| owner == &job.name)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn job_execution(&self, job: &ResourceId, name: &str) -> Result<JsonValue> {
        self.record(format!("execution {}/{}", job.name, name));
        self.executions
            .lock()
            .unwrap()
            .iter()
            .find(|(owner, doc)| owner == &job.name && doc["name"] == name)
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| AzError::Backend(BackendError::not_found(name)))
    }

    async fn access_token(&self) -> Result<String> {
        Ok("fake-token".into())
    }
}
