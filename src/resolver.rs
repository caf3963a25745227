//! Turns resource locators into concrete resource descriptors.
//!
//! Search order for a name-scoped locator:
//! 1. subscription: the default one when absent, otherwise looked up;
//! 2. resource group: the named group when given, otherwise every group in
//!    enumeration order;
//! 3. name: when given, the first group holding that name wins and later
//!    groups are not visited; otherwise every resource of the kind is collected.

use tracing::debug;

use crate::arm::ManagementClient;
use crate::error::{AzError, Result};
use crate::locator::{ResourceDescriptor, ResourceId, ResourceKind, ResourceLocator};

pub struct Resolver<'a> {
    client: &'a dyn ManagementClient,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a dyn ManagementClient) -> Self {
        Self { client }
    }

    /// Zero, one or many descriptors in discovery order. Absence is an empty result.
    pub async fn resolve(
        &self,
        kind: ResourceKind,
        locator: &ResourceLocator,
    ) -> Result<Vec<ResourceDescriptor>> {
        match locator {
            ResourceLocator::ById(id) => {
                Ok(vec![ResourceDescriptor::unfetched(parse_id(kind, id)?)])
            }
            ResourceLocator::ByName {
                subscription_id,
                resource_group,
                name,
            } => {
                let subscription_id = self.subscription_id(subscription_id.as_deref()).await?;
                let groups = match resource_group {
                    Some(group) => {
                        vec![self.client.resource_group(&subscription_id, group).await?.name]
                    }
                    None => self
                        .client
                        .resource_groups(&subscription_id)
                        .await?
                        .into_iter()
                        .map(|g| g.name)
                        .collect(),
                };

                match name {
                    Some(name) => Ok(self
                        .find_first(kind, &subscription_id, &groups, name)
                        .await?
                        .into_iter()
                        .collect()),
                    None => self.collect_all(kind, &subscription_id, &groups).await,
                }
            }
        }
    }

    /// Identity of a single target without fetching it.
    ///
    /// Needs an id, or a resource group plus name; the default subscription
    /// fills in a missing subscription.
    pub async fn target(&self, kind: ResourceKind, locator: &ResourceLocator) -> Result<ResourceId> {
        match locator {
            ResourceLocator::ById(id) => parse_id(kind, id),
            ResourceLocator::ByName {
                subscription_id,
                resource_group: Some(resource_group),
                name: Some(name),
            } => {
                let subscription_id = match subscription_id {
                    Some(id) => id.clone(),
                    None => self.client.default_subscription().await?.subscription_id,
                };
                Ok(ResourceId::new(subscription_id, resource_group, kind, name))
            }
            ResourceLocator::ByName { .. } => Err(AzError::unexpected(format!(
                "a {} needs either a resource id or both a resource group and a name",
                kind.display_name()
            ))),
        }
    }

    /// Explicit subscription (verified to exist) or the caller's default.
    pub async fn subscription_id(&self, explicit: Option<&str>) -> Result<String> {
        let subscription = match explicit {
            Some(id) => self.client.subscription(id).await?,
            None => self.client.default_subscription().await?,
        };
        Ok(subscription.subscription_id)
    }

    async fn find_first(
        &self,
        kind: ResourceKind,
        subscription_id: &str,
        groups: &[String],
        name: &str,
    ) -> Result<Option<ResourceDescriptor>> {
        for group in groups {
            let id = ResourceId::new(subscription_id, group.as_str(), kind, name);
            if !self.client.exists(&id).await? {
                continue;
            }
            debug!(kind = kind.display_name(), resource_group = %group, name, "resolved by name");
            let state = self.client.get(&id).await?;
            return Ok(Some(ResourceDescriptor::with_state(id, state)));
        }
        debug!(kind = kind.display_name(), name, groups = groups.len(), "no match");
        Ok(None)
    }

    async fn collect_all(
        &self,
        kind: ResourceKind,
        subscription_id: &str,
        groups: &[String],
    ) -> Result<Vec<ResourceDescriptor>> {
        let mut found = Vec::new();
        for group in groups {
            for state in self.client.list(subscription_id, group, kind).await? {
                found.push(descriptor_from_state(kind, subscription_id, group, state)?);
            }
        }
        Ok(found)
    }
}

fn parse_id(kind: ResourceKind, id: &str) -> Result<ResourceId> {
    let parsed = ResourceId::parse(id)?;
    if parsed.kind != kind {
        return Err(AzError::unexpected(format!(
            "'{}' is a {}, expected a {}",
            id,
            parsed.kind.display_name(),
            kind.display_name()
        )));
    }
    Ok(parsed)
}

/// Prefer the id the backend reports; fall back to the scan coordinates.
fn descriptor_from_state(
    kind: ResourceKind,
    subscription_id: &str,
    group: &str,
    state: serde_json::Value,
) -> Result<ResourceDescriptor> {
    if let Some(id) = state.get("id").and_then(|v| v.as_str()) {
        if let Ok(parsed) = ResourceId::parse(id) {
            return Ok(ResourceDescriptor::with_state(parsed, state));
        }
    }
    let name = state
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AzError::unexpected(format!("listed {} has no name", kind.display_name())))?
        .to_string();
    Ok(ResourceDescriptor::with_state(
        ResourceId::new(subscription_id, group, kind, name),
        state,
    ))
}
