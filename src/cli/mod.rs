pub mod config;
pub mod params;
mod run;

pub use run::execute;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::{
    ActiveRevisionsMode, DnsNameLabelReusePolicy, GroupSku, IngressTransport, IpAddressType,
    OsType, Protocol, RestartPolicy,
};
use crate::template::EnvVarInput;
use params::{parse_env, parse_port, parse_secret_env};

#[derive(Parser)]
#[command(name = "azcontainer")]
#[command(about = "Manage Azure Container Instances, Container Apps and Container App Jobs")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ./.azcontainer.toml, then the user config directory)
    #[arg(long, global = true, env = "AZCONTAINER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Stop waiting on long-running operations after this many seconds (0 waits forever)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify that a management client can be authenticated
    Connect(ConnectArgs),
    /// Show a container app managed environment
    GetEnvironment(TargetArgs),
    /// Show container apps
    GetApp(LocatorArgs),
    /// Show container app jobs
    GetAppJob(LocatorArgs),
    /// Show execution details of a container app job
    GetJobExecution(GetJobExecutionArgs),
    /// Show container groups
    GetContainerGroup(LocatorArgs),
    /// Create or update a container group
    CreateContainerGroup(CreateContainerGroupArgs),
    /// Create or update a container app
    CreateApp(CreateAppArgs),
    /// Create or update a container app job
    CreateAppJob(CreateAppJobArgs),
    /// Start one execution of a container app job
    StartJob(StartJobArgs),
    /// Delete a container app
    RemoveApp(TargetArgs),
    /// Delete a container app job
    RemoveAppJob(TargetArgs),
    /// Delete a container group
    RemoveContainerGroup(TargetArgs),
    /// Print a JSON fragment for use with the create and start commands
    New(NewArgs),
}

#[derive(Args)]
pub struct ConnectArgs {
    /// Build a new client even if one is cached
    #[arg(long)]
    pub force: bool,
}

/// Zero, one or many resources: by id, or by optional subscription, group and name.
#[derive(Args, Clone)]
pub struct LocatorArgs {
    /// Fully-qualified resource id
    #[arg(long, conflicts_with_all = ["resource_group", "name"])]
    pub resource_id: Option<String>,

    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Search every resource group when omitted
    #[arg(long, short = 'g')]
    pub resource_group: Option<String>,

    /// Return every resource of the kind when omitted
    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

/// Exactly one resource: by id, or by resource group and name.
#[derive(Args, Clone)]
pub struct TargetArgs {
    /// Fully-qualified resource id
    #[arg(long, conflicts_with_all = ["resource_group", "name"], required_unless_present_all = ["resource_group", "name"])]
    pub resource_id: Option<String>,

    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    #[arg(long, short = 'g')]
    pub resource_group: Option<String>,

    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

#[derive(Args, Clone)]
pub struct CreateTargetArgs {
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    #[arg(long, short = 'g')]
    pub resource_group: String,

    #[arg(long, short = 'n')]
    pub name: String,
}

#[derive(Args)]
pub struct GetJobExecutionArgs {
    #[command(flatten)]
    pub job: TargetArgs,

    /// A single execution; every execution of the job when omitted
    #[arg(long)]
    pub execution_name: Option<String>,
}

#[derive(Args)]
pub struct CreateContainerGroupArgs {
    #[command(flatten)]
    pub target: CreateTargetArgs,

    /// Container fragment file from `new container` (repeatable)
    #[arg(long = "container", required = true)]
    pub containers: Vec<PathBuf>,

    #[arg(long, default_value_t = OsType::Linux)]
    pub os_type: OsType,

    #[arg(long, default_value_t = RestartPolicy::Always)]
    pub restart_policy: RestartPolicy,

    #[arg(long, default_value_t = GroupSku::Standard)]
    pub sku: GroupSku,

    #[arg(long, default_value_t = IpAddressType::Public)]
    pub ip_address_type: IpAddressType,

    /// Port on the group's IP address, `PORT[/PROTOCOL]` (repeatable)
    #[arg(long = "port", value_parser = parse_port)]
    pub ports: Vec<(u16, Option<Protocol>)>,

    /// Registry credential fragment file from `new group-registry-credential` (repeatable)
    #[arg(long = "registry")]
    pub registries: Vec<PathBuf>,

    #[arg(long)]
    pub location: Option<String>,

    /// `system` or a user-assigned identity resource id (repeatable)
    #[arg(long = "identity")]
    pub identities: Vec<String>,

    /// Public DNS label; defaults to the group name
    #[arg(long)]
    pub dns_name_label: Option<String>,

    #[arg(long, default_value_t = DnsNameLabelReusePolicy::NoReuse)]
    pub dns_name_label_reuse_policy: DnsNameLabelReusePolicy,

    /// Subnet for a private IP address (repeatable)
    #[arg(long = "subnet-id")]
    pub subnet_ids: Vec<String>,
}

#[derive(Args)]
pub struct CreateAppArgs {
    #[command(flatten)]
    pub target: CreateTargetArgs,

    /// Managed environment resource id
    #[arg(long)]
    pub environment_id: String,

    /// Template fragment file from `new app-template`
    #[arg(long)]
    pub template: PathBuf,

    #[arg(long, default_value_t = ActiveRevisionsMode::Multiple)]
    pub active_revisions_mode: ActiveRevisionsMode,

    /// Ingress fragment file from `new ingress`
    #[arg(long)]
    pub ingress: Option<PathBuf>,

    /// Registry credential fragment file from `new app-registry-credential` (repeatable)
    #[arg(long = "registry")]
    pub registries: Vec<PathBuf>,

    #[arg(long)]
    pub location: Option<String>,

    /// `system` or a user-assigned identity resource id (repeatable)
    #[arg(long = "identity")]
    pub identities: Vec<String>,
}

#[derive(Args)]
pub struct CreateAppJobArgs {
    #[command(flatten)]
    pub target: CreateTargetArgs,

    /// Managed environment resource id
    #[arg(long)]
    pub environment_id: String,

    /// Template fragment file from `new job-template`
    #[arg(long)]
    pub template: PathBuf,

    /// Registry credential fragment file from `new app-registry-credential` (repeatable)
    #[arg(long = "registry")]
    pub registries: Vec<PathBuf>,

    #[arg(long)]
    pub location: Option<String>,

    /// `system` or a user-assigned identity resource id (repeatable)
    #[arg(long = "identity")]
    pub identities: Vec<String>,

    /// Seconds a replica may run [default: 180]
    #[arg(long)]
    pub replica_timeout: Option<u32>,

    /// [default: 0]
    #[arg(long)]
    pub replica_retry_limit: Option<u32>,

    /// [default: 4]
    #[arg(long)]
    pub parallelism: Option<u32>,

    /// [default: 1]
    #[arg(long)]
    pub replica_completion_count: Option<u32>,
}

#[derive(Args)]
pub struct StartJobArgs {
    #[command(flatten)]
    pub job: TargetArgs,

    /// Execution template fragment file from `new job-execution-template`; replaces the stored template
    #[arg(long, conflicts_with_all = ["command", "env", "secret_env"])]
    pub execution_template: Option<PathBuf>,

    /// Replacement command for the primary container
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub command: Option<Vec<String>>,

    /// Extra environment variable, `NAME=VALUE` (repeatable)
    #[arg(long, value_parser = parse_env)]
    pub env: Vec<EnvVarInput>,

    /// Extra secret-backed variable, `NAME=SECRETREF` (repeatable). Listed after every `--env` entry
    #[arg(long, value_parser = parse_secret_env)]
    pub secret_env: Vec<EnvVarInput>,
}

#[derive(Args)]
pub struct NewArgs {
    #[command(subcommand)]
    pub command: NewCommands,
}

#[derive(Subcommand)]
pub enum NewCommands {
    /// Container app ingress
    Ingress(NewIngressArgs),
    /// Container app traffic weight
    TrafficWeight(NewTrafficWeightArgs),
    /// Container app revision template
    AppTemplate(NewAppTemplateArgs),
    /// Container app job template
    JobTemplate(JobContainerArgs),
    /// Execution template for `start-job`
    JobExecutionTemplate(JobContainerArgs),
    /// Registry credentials for a container app or job
    AppRegistryCredential(NewAppRegistryArgs),
    /// Registry credentials for a container group
    GroupRegistryCredential(NewGroupRegistryArgs),
    /// Container instance for a container group
    Container(NewContainerArgs),
    /// Port on a container group's IP address
    GroupPort(NewPortArgs),
    /// Port exposed by a container instance
    ContainerPort(NewPortArgs),
}

#[derive(Args)]
pub struct NewIngressArgs {
    #[arg(long)]
    pub external: bool,

    #[arg(long)]
    pub target_port: u16,

    /// [default: 0]
    #[arg(long)]
    pub exposed_port: Option<u16>,

    #[arg(long, default_value_t = IngressTransport::Auto)]
    pub transport: IngressTransport,

    /// Traffic weight fragment file from `new traffic-weight` (repeatable)
    #[arg(long = "traffic")]
    pub traffic: Vec<PathBuf>,
}

#[derive(Args)]
pub struct NewTrafficWeightArgs {
    #[arg(long)]
    pub revision_name: String,

    /// [default: 0]
    #[arg(long)]
    pub weight: Option<i32>,

    /// [default: ""]
    #[arg(long)]
    pub label: Option<String>,

    /// Route to the latest revision; omitted from the fragment unless given
    #[arg(long)]
    pub latest_revision: Option<bool>,
}

#[derive(Args)]
pub struct NewAppTemplateArgs {
    #[arg(long)]
    pub revision_suffix: Option<String>,

    #[arg(long)]
    pub image: String,

    #[arg(long)]
    pub name: String,

    /// Cores [default: 0.5]
    #[arg(long)]
    pub cpu: Option<f64>,

    /// [default: 1Gi]
    #[arg(long)]
    pub memory: Option<String>,
}

#[derive(Args)]
pub struct JobContainerArgs {
    #[arg(long)]
    pub image: String,

    #[arg(long)]
    pub name: String,

    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// `NAME=VALUE` (repeatable)
    #[arg(long, value_parser = parse_env)]
    pub env: Vec<EnvVarInput>,

    /// `NAME=SECRETREF` (repeatable). Listed after every `--env` entry
    #[arg(long, value_parser = parse_secret_env)]
    pub secret_env: Vec<EnvVarInput>,

    /// Cores [default: 1.5]
    #[arg(long)]
    pub cpu: Option<f64>,

    /// [default: 3Gi]
    #[arg(long)]
    pub memory: Option<String>,
}

#[derive(Args)]
pub struct NewAppRegistryArgs {
    #[arg(long)]
    pub server: String,

    /// Identity used to pull images
    #[arg(long, conflicts_with_all = ["username", "password_secret_ref"], required_unless_present = "username")]
    pub identity: Option<String>,

    #[arg(long, requires = "password_secret_ref")]
    pub username: Option<String>,

    /// Name of the app secret holding the registry password
    #[arg(long, requires = "username")]
    pub password_secret_ref: Option<String>,
}

#[derive(Args)]
pub struct NewGroupRegistryArgs {
    #[arg(long)]
    pub server: String,

    /// Identity used to pull images
    #[arg(long, conflicts_with_all = ["username", "password"], required_unless_present = "username")]
    pub identity: Option<String>,

    #[arg(long, requires = "password")]
    pub username: Option<String>,

    #[arg(long, requires = "username", env = "AZCONTAINER_REGISTRY_PASSWORD")]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct NewContainerArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub image: String,

    /// Cores [default: 2]
    #[arg(long)]
    pub cpu: Option<f64>,

    /// [default: 3]
    #[arg(long)]
    pub memory_in_gb: Option<f64>,

    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// `PORT[/PROTOCOL]` (repeatable)
    #[arg(long = "port", value_parser = parse_port)]
    pub ports: Vec<(u16, Option<Protocol>)>,

    /// `NAME=VALUE` (repeatable)
    #[arg(long, value_parser = parse_env)]
    pub env: Vec<EnvVarInput>,

    /// `NAME=SECUREVALUE` (repeatable). Listed after every `--env` entry
    #[arg(long, value_parser = parse_secret_env)]
    pub secure_env: Vec<EnvVarInput>,
}

#[derive(Args)]
pub struct NewPortArgs {
    #[arg(long)]
    pub port: u16,

    #[arg(long, default_value_t = Protocol::Tcp)]
    pub protocol: Protocol,
}
