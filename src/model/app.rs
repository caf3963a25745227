//! Container apps (`Microsoft.App/containerApps`) and jobs (`Microsoft.App/jobs`).

use serde::{Deserialize, Serialize};

use super::{string_enum, ContainerResources, EnvironmentVariable, ManagedIdentity};

string_enum! {
    pub enum ActiveRevisionsMode {
        Multiple => "Multiple",
        Single => "Single",
    }
    default = Multiple;
}

string_enum! {
    pub enum IngressTransport {
        Auto => "Auto",
        Http => "Http",
        Http2 => "Http2",
        Tcp => "Tcp",
    }
    default = Auto;
}

string_enum! {
    pub enum TriggerType {
        Manual => "Manual",
        Schedule => "Schedule",
        Event => "Event",
    }
    default = Manual;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficWeight {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
    #[serde(default)]
    pub weight: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_revision: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    #[serde(default)]
    pub external: bool,
    pub target_port: u16,
    #[serde(default)]
    pub exposed_port: u16,
    #[serde(default)]
    pub transport: IngressTransport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficWeight>,
}

/// Private registry credentials for container apps and jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentials {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppContainer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ContainerResources>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_suffix: Option<String>,
    #[serde(default)]
    pub containers: Vec<AppContainer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppConfiguration {
    #[serde(default)]
    pub active_revisions_mode: ActiveRevisionsMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Ingress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<RegistryCredentials>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppProperties {
    pub environment_id: String,
    pub configuration: ContainerAppConfiguration,
    pub template: AppTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppDocument {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedIdentity>,
    pub properties: ContainerAppProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTriggerConfig {
    pub replica_completion_count: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    pub trigger_type: TriggerType,
    /// Seconds a replica may run before it is failed.
    pub replica_timeout: u32,
    pub replica_retry_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_trigger_config: Option<ManualTriggerConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<RegistryCredentials>,
}

/// Stored template of a job. Same container shape as an app template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    #[serde(default)]
    pub containers: Vec<AppContainer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<AppContainer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperties {
    pub environment_id: String,
    pub configuration: JobConfiguration,
    pub template: JobTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDocument {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedIdentity>,
    pub properties: JobProperties,
}

pub type ExecutionContainer = AppContainer;

/// Template submitted when starting one execution of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTemplate {
    #[serde(default)]
    pub containers: Vec<ExecutionContainer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<ExecutionContainer>,
}

impl From<JobTemplate> for ExecutionTemplate {
    fn from(template: JobTemplate) -> Self {
        Self {
            containers: template.containers,
            init_containers: template.init_containers,
        }
    }
}
