use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

use super::in_context;
use crate::arm::ManagementClient;
use crate::error::Result;
use crate::locator::{Output, ResourceDescriptor, ResourceId, ResourceKind, ResourceLocator};
use crate::lro::{LroExecutor, Operation};
use crate::resolver::Resolver;
use crate::session::Session;
use crate::template::{ContainerAppConfig, ContainerAppJobConfig, ContainerGroupConfig};

/// Where a new resource is created. The default subscription fills in a missing one.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTarget {
    pub subscription_id: Option<String>,
    pub resource_group: String,
    pub name: String,
}

impl CreateTarget {
    fn locator(&self) -> ResourceLocator {
        ResourceLocator::by_name(
            self.subscription_id.clone(),
            Some(self.resource_group.clone()),
            Some(self.name.clone()),
        )
    }
}

pub async fn get_environment(session: &Session, locator: &ResourceLocator) -> Result<JsonValue> {
    in_context("get-environment", locator.label(), async {
        let client = session.require_client().await?;
        let id = Resolver::new(client.as_ref())
            .target(ResourceKind::ManagedEnvironment, locator)
            .await?;
        client.get(&id).await
    })
    .await
}

pub async fn get_apps(session: &Session, locator: &ResourceLocator) -> Result<Output<JsonValue>> {
    get_resources(session, "get-app", ResourceKind::ContainerApp, locator).await
}

pub async fn get_app_jobs(
    session: &Session,
    locator: &ResourceLocator,
) -> Result<Output<JsonValue>> {
    get_resources(session, "get-app-job", ResourceKind::ContainerAppJob, locator).await
}

pub async fn get_container_groups(
    session: &Session,
    locator: &ResourceLocator,
) -> Result<Output<JsonValue>> {
    get_resources(
        session,
        "get-container-group",
        ResourceKind::ContainerGroup,
        locator,
    )
    .await
}

async fn get_resources(
    session: &Session,
    operation: &'static str,
    kind: ResourceKind,
    locator: &ResourceLocator,
) -> Result<Output<JsonValue>> {
    in_context(operation, locator.label(), async {
        let client = session.require_client().await?;
        let descriptors = Resolver::new(client.as_ref()).resolve(kind, locator).await?;

        let mut states = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            states.push(state_of(client.as_ref(), descriptor).await?);
        }
        info!(kind = kind.display_name(), found = states.len(), "resolved resources");
        Ok(Output::from_vec(states))
    })
    .await
}

/// The descriptor's state, fetching it when resolution did not.
async fn state_of(client: &dyn ManagementClient, descriptor: ResourceDescriptor) -> Result<JsonValue> {
    match descriptor.state {
        Some(state) => Ok(state),
        None => client.get(&descriptor.id).await,
    }
}

pub async fn create_container_group(
    session: &Session,
    target: &CreateTarget,
    config: &ContainerGroupConfig,
) -> Result<JsonValue> {
    in_context("create-container-group", target.name.clone(), async {
        let document = config.build(&target.name)?;
        create(session, ResourceKind::ContainerGroup, target, &document).await
    })
    .await
}

pub async fn create_app(
    session: &Session,
    target: &CreateTarget,
    config: &ContainerAppConfig,
) -> Result<JsonValue> {
    in_context(
        "create-app",
        target.name.clone(),
        create(session, ResourceKind::ContainerApp, target, &config.build()),
    )
    .await
}

pub async fn create_app_job(
    session: &Session,
    target: &CreateTarget,
    config: &ContainerAppJobConfig,
) -> Result<JsonValue> {
    in_context(
        "create-app-job",
        target.name.clone(),
        create(session, ResourceKind::ContainerAppJob, target, &config.build()),
    )
    .await
}

async fn create<D: Serialize>(
    session: &Session,
    kind: ResourceKind,
    target: &CreateTarget,
    document: &D,
) -> Result<JsonValue> {
    let client = session.require_client().await?;
    let id = Resolver::new(client.as_ref())
        .target(kind, &target.locator())
        .await?;
    let document = serde_json::to_value(document)?;

    info!(kind = kind.display_name(), id = %id, "creating or updating");
    let result = LroExecutor::new(client.as_ref(), session.poll_config().clone())
        .submit(Operation::CreateOrUpdate {
            target: id.clone(),
            document,
        })
        .await?;

    match result {
        Some(state) => Ok(state),
        None => client.get(&id).await,
    }
}

pub async fn remove_app(session: &Session, locator: &ResourceLocator) -> Result<()> {
    remove(session, "remove-app", ResourceKind::ContainerApp, locator).await
}

pub async fn remove_app_job(session: &Session, locator: &ResourceLocator) -> Result<()> {
    remove(session, "remove-app-job", ResourceKind::ContainerAppJob, locator).await
}

pub async fn remove_container_group(session: &Session, locator: &ResourceLocator) -> Result<()> {
    remove(
        session,
        "remove-container-group",
        ResourceKind::ContainerGroup,
        locator,
    )
    .await
}

async fn remove(
    session: &Session,
    operation: &'static str,
    kind: ResourceKind,
    locator: &ResourceLocator,
) -> Result<()> {
    in_context(operation, locator.label(), async {
        let client = session.require_client().await?;
        let id: ResourceId = Resolver::new(client.as_ref()).target(kind, locator).await?;

        info!(kind = kind.display_name(), id = %id, "deleting");
        LroExecutor::new(client.as_ref(), session.poll_config().clone())
            .submit(Operation::Delete { target: id })
            .await?;
        Ok(())
    })
    .await
}
