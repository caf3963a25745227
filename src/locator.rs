//! Resource identities, locators and the output cardinality rule.

use serde_json::Value as JsonValue;

use crate::error::{AzError, Result};

/// Resource kinds handled by this crate, with their ARM provider type and API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ContainerGroup,
    ContainerApp,
    ContainerAppJob,
    ManagedEnvironment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ContainerGroup,
        ResourceKind::ContainerApp,
        ResourceKind::ContainerAppJob,
        ResourceKind::ManagedEnvironment,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            ResourceKind::ContainerGroup => "Microsoft.ContainerInstance",
            _ => "Microsoft.App",
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::ContainerGroup => "containerGroups",
            ResourceKind::ContainerApp => "containerApps",
            ResourceKind::ContainerAppJob => "jobs",
            ResourceKind::ManagedEnvironment => "managedEnvironments",
        }
    }

    pub fn api_version(&self) -> &'static str {
        "2023-05-01"
    }

    /// Human-readable name used in logs and error context.
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::ContainerGroup => "container group",
            ResourceKind::ContainerApp => "container app",
            ResourceKind::ContainerAppJob => "container app job",
            ResourceKind::ManagedEnvironment => "managed environment",
        }
    }

    fn from_provider(namespace: &str, type_name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| {
            k.namespace().eq_ignore_ascii_case(namespace)
                && k.type_name().eq_ignore_ascii_case(type_name)
        })
    }
}

/// Fully-qualified ARM id of a resource in a resource group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        kind: ResourceKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            kind,
            name: name.into(),
        }
    }

    /// Parse `/subscriptions/{s}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`.
    pub fn parse(id: &str) -> Result<Self> {
        let segments: Vec<&str> = id.trim_matches('/').split('/').collect();
        let invalid = || AzError::unexpected(format!("'{}' is not a valid resource id", id));

        match segments.as_slice() {
            [subs, sub, groups, rg, providers, ns, type_name, name]
                if subs.eq_ignore_ascii_case("subscriptions")
                    && groups.eq_ignore_ascii_case("resourceGroups")
                    && providers.eq_ignore_ascii_case("providers")
                    && !sub.is_empty()
                    && !rg.is_empty()
                    && !name.is_empty() =>
            {
                let kind = ResourceKind::from_provider(ns, type_name).ok_or_else(|| {
                    AzError::unexpected(format!("unsupported resource type '{}/{}'", ns, type_name))
                })?;
                Ok(Self::new(*sub, *rg, kind, *name))
            }
            _ => Err(invalid()),
        }
    }

    pub fn path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id,
            self.resource_group,
            self.kind.namespace(),
            self.kind.type_name(),
            self.name
        )
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Caller-supplied identification of a target resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    ById(String),
    ByName {
        subscription_id: Option<String>,
        resource_group: Option<String>,
        name: Option<String>,
    },
}

impl ResourceLocator {
    /// Build a name-scoped locator; empty strings count as absent.
    pub fn by_name(
        subscription_id: Option<String>,
        resource_group: Option<String>,
        name: Option<String>,
    ) -> Self {
        ResourceLocator::ByName {
            subscription_id: non_empty(subscription_id),
            resource_group: non_empty(resource_group),
            name: non_empty(name),
        }
    }

    /// Either the id (when given) or the name triple.
    pub fn from_parts(
        resource_id: Option<String>,
        subscription_id: Option<String>,
        resource_group: Option<String>,
        name: Option<String>,
    ) -> Self {
        match non_empty(resource_id) {
            Some(id) => ResourceLocator::ById(id),
            None => Self::by_name(subscription_id, resource_group, name),
        }
    }

    /// Short label for logs and error context.
    pub fn label(&self) -> String {
        match self {
            ResourceLocator::ById(id) => id.clone(),
            ResourceLocator::ByName {
                resource_group,
                name,
                ..
            } => format!(
                "{}/{}",
                resource_group.as_deref().unwrap_or("*"),
                name.as_deref().unwrap_or("*")
            ),
        }
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A resolved resource plus its state document when it has been fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub state: Option<JsonValue>,
}

impl ResourceDescriptor {
    pub fn unfetched(id: ResourceId) -> Self {
        Self { id, state: None }
    }

    pub fn with_state(id: ResourceId, state: JsonValue) -> Self {
        Self {
            id,
            state: Some(state),
        }
    }
}

/// Zero, one or many results, as presented to the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum Output<T> {
    Nothing,
    One(T),
    Many(Vec<T>),
}

impl<T> Output<T> {
    pub fn from_vec(mut items: Vec<T>) -> Self {
        match items.len() {
            0 => Output::Nothing,
            1 => Output::One(items.remove(0)),
            _ => Output::Many(items),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Output::Nothing => Vec::new(),
            Output::One(item) => vec![item],
            Output::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Output::Nothing => 0,
            Output::One(_) => 1,
            Output::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Output::Nothing)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Output<U> {
        Output::from_vec(self.into_vec().into_iter().map(f).collect())
    }
}
