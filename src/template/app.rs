//! Container app and container app job documents plus their fragments.

use super::{app_env, identity, EnvVarInput, DEFAULT_LOCATION};
use crate::model::{
    ActiveRevisionsMode, AppContainer, AppTemplate, ContainerAppConfiguration, ContainerAppDocument,
    ContainerAppProperties, ContainerResources, ExecutionTemplate, Ingress, IngressTransport,
    JobConfiguration, JobDocument, JobProperties, JobTemplate, ManualTriggerConfig,
    RegistryCredentials, TrafficWeight, TriggerType,
};

const APP_CPU: f64 = 0.5;
const APP_MEMORY: &str = "1Gi";
const JOB_CPU: f64 = 1.5;
const JOB_MEMORY: &str = "3Gi";

/// Revision template of a container app with a single container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppTemplateConfig {
    pub revision_suffix: Option<String>,
    pub image: String,
    pub name: String,
    pub cpu: Option<f64>,
    pub memory: Option<String>,
}

impl AppTemplateConfig {
    pub fn build(&self) -> AppTemplate {
        AppTemplate {
            revision_suffix: self.revision_suffix.clone().filter(|s| !s.is_empty()),
            containers: vec![AppContainer {
                image: Some(self.image.clone()),
                name: Some(self.name.clone()),
                resources: Some(ContainerResources::new(
                    self.cpu.unwrap_or(APP_CPU),
                    self.memory.clone().unwrap_or_else(|| APP_MEMORY.to_string()),
                )),
                ..Default::default()
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficWeightConfig {
    pub revision_name: String,
    pub weight: Option<i32>,
    pub label: Option<String>,
    /// Only sent when explicitly chosen.
    pub latest_revision: Option<bool>,
}

impl TrafficWeightConfig {
    pub fn build(&self) -> TrafficWeight {
        TrafficWeight {
            revision_name: Some(self.revision_name.clone()),
            weight: self.weight.unwrap_or(0),
            label: Some(self.label.clone().unwrap_or_default()),
            latest_revision: self.latest_revision,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngressConfig {
    pub external: bool,
    pub target_port: u16,
    pub exposed_port: Option<u16>,
    pub transport: IngressTransport,
    pub traffic: Vec<TrafficWeight>,
}

impl IngressConfig {
    pub fn build(&self) -> Ingress {
        Ingress {
            external: self.external,
            target_port: self.target_port,
            exposed_port: self.exposed_port.unwrap_or(0),
            transport: self.transport,
            traffic: self.traffic.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerAppConfig {
    pub environment_id: String,
    pub location: Option<String>,
    pub active_revisions_mode: ActiveRevisionsMode,
    pub ingress: Option<Ingress>,
    pub registries: Vec<RegistryCredentials>,
    pub template: AppTemplate,
    pub identities: Vec<String>,
}

impl ContainerAppConfig {
    pub fn build(&self) -> ContainerAppDocument {
        ContainerAppDocument {
            location: location_or_default(&self.location),
            identity: identity(&self.identities),
            properties: ContainerAppProperties {
                environment_id: self.environment_id.clone(),
                configuration: ContainerAppConfiguration {
                    active_revisions_mode: self.active_revisions_mode,
                    ingress: self.ingress.clone(),
                    registries: self.registries.clone(),
                },
                template: self.template.clone(),
            },
        }
    }
}

/// The single container of a job template or job execution template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobContainerConfig {
    pub image: String,
    pub name: String,
    pub command: Vec<String>,
    pub env: Vec<EnvVarInput>,
    pub cpu: Option<f64>,
    pub memory: Option<String>,
}

impl JobContainerConfig {
    fn container(&self) -> AppContainer {
        AppContainer {
            image: Some(self.image.clone()),
            name: Some(self.name.clone()),
            command: self.command.clone(),
            env: app_env(&self.env),
            resources: Some(ContainerResources::new(
                self.cpu.unwrap_or(JOB_CPU),
                self.memory.clone().unwrap_or_else(|| JOB_MEMORY.to_string()),
            )),
            ..Default::default()
        }
    }

    pub fn job_template(&self) -> JobTemplate {
        JobTemplate {
            containers: vec![self.container()],
            ..Default::default()
        }
    }

    pub fn execution_template(&self) -> ExecutionTemplate {
        ExecutionTemplate {
            containers: vec![self.container()],
            ..Default::default()
        }
    }
}

/// Manual trigger settings; unset fields take the defaults below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobTriggerConfig {
    /// Seconds; 180.
    pub replica_timeout: Option<u32>,
    /// 0.
    pub replica_retry_limit: Option<u32>,
    /// 4.
    pub parallelism: Option<u32>,
    /// 1.
    pub replica_completion_count: Option<u32>,
}

impl JobTriggerConfig {
    pub fn build(&self) -> JobConfiguration {
        JobConfiguration {
            trigger_type: TriggerType::Manual,
            replica_timeout: self.replica_timeout.unwrap_or(180),
            replica_retry_limit: self.replica_retry_limit.unwrap_or(0),
            manual_trigger_config: Some(ManualTriggerConfig {
                replica_completion_count: self.replica_completion_count.unwrap_or(1),
                parallelism: self.parallelism.unwrap_or(4),
            }),
            registries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerAppJobConfig {
    pub environment_id: String,
    pub location: Option<String>,
    pub trigger: JobTriggerConfig,
    pub registries: Vec<RegistryCredentials>,
    pub template: JobTemplate,
    pub identities: Vec<String>,
}

impl ContainerAppJobConfig {
    pub fn build(&self) -> JobDocument {
        let mut configuration = self.trigger.build();
        configuration.registries = self.registries.clone();

        JobDocument {
            location: location_or_default(&self.location),
            identity: identity(&self.identities),
            properties: JobProperties {
                environment_id: self.environment_id.clone(),
                configuration,
                template: self.template.clone(),
            },
        }
    }
}

fn location_or_default(location: &Option<String>) -> String {
    location
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
}
