use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

use super::config::Config;
use super::params::{read_fragment, read_fragments};
use super::*;
use crate::commands::{self, CreateTarget, StartOverrides};
use crate::locator::{Output, ResourceLocator};
use crate::model::{
    AppTemplate, ContainerInstance, ExecutionTemplate, GroupRegistryCredential, Ingress,
    JobTemplate, RegistryCredentials, TrafficWeight,
};
use crate::session::{ArmClientFactory, Session};
use crate::template::{
    container_port, group_port, AppTemplateConfig, ContainerAppConfig, ContainerAppJobConfig,
    ContainerGroupConfig, ContainerInstanceConfig, GroupNetwork, IngressConfig, JobContainerConfig,
    JobTriggerConfig, RegistryAuth, RegistryConfig, TrafficWeightConfig,
};

/// Run one parsed invocation to completion.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::New(args) => execute_new(args.command),
        command => execute_remote(command, cli.timeout, &config).await,
    }
}

async fn execute_remote(command: Commands, timeout: Option<u64>, config: &Config) -> Result<()> {
    let mut factory = ArmClientFactory::from_env();
    if let Some(endpoint) = &config.management_endpoint {
        factory = factory.with_endpoint(endpoint.clone());
    }
    let session = Session::new(factory).with_poll_config(config.poll_config(timeout));

    let force = matches!(&command, Commands::Connect(args) if args.force);
    commands::connect(&session, force).await?;

    match command {
        Commands::Connect(_) => println!("==> Connected"),
        Commands::GetEnvironment(args) => {
            let environment = commands::get_environment(&session, &args.locator(config)).await?;
            print_json(&environment)?;
        }
        Commands::GetApp(args) => {
            print_output(commands::get_apps(&session, &args.locator(config)).await?)?
        }
        Commands::GetAppJob(args) => {
            print_output(commands::get_app_jobs(&session, &args.locator(config)).await?)?
        }
        Commands::GetContainerGroup(args) => {
            print_output(commands::get_container_groups(&session, &args.locator(config)).await?)?
        }
        Commands::GetJobExecution(args) => {
            let result = commands::get_job_executions(
                &session,
                &args.job.locator(config),
                args.execution_name.as_deref(),
            )
            .await?;

            for details in &result.details {
                println!("{}", details);
            }
            if !result.failed.is_empty() {
                for error in &result.failed {
                    eprintln!("error: {}", error);
                }
                bail!(
                    "{} of {} execution detail fetches failed",
                    result.failed.len(),
                    result.failed.len() + result.details.len()
                );
            }
        }
        Commands::CreateContainerGroup(args) => {
            let target = args.target.create_target(config);
            let group = commands::create_container_group(
                &session,
                &target,
                &container_group_config(args, config)?,
            )
            .await?;
            print_json(&group)?;
        }
        Commands::CreateApp(args) => {
            let target = args.target.create_target(config);
            let app = ContainerAppConfig {
                environment_id: args.environment_id,
                location: args.location.or_else(|| config.location.clone()),
                active_revisions_mode: args.active_revisions_mode,
                ingress: args
                    .ingress
                    .as_deref()
                    .map(read_fragment::<Ingress>)
                    .transpose()?,
                registries: read_all::<RegistryCredentials>(&args.registries)?,
                template: read_fragment::<AppTemplate>(&args.template)?,
                identities: args.identities,
            };
            print_json(&commands::create_app(&session, &target, &app).await?)?;
        }
        Commands::CreateAppJob(args) => {
            let target = args.target.create_target(config);
            let job = ContainerAppJobConfig {
                environment_id: args.environment_id,
                location: args.location.or_else(|| config.location.clone()),
                trigger: JobTriggerConfig {
                    replica_timeout: args.replica_timeout,
                    replica_retry_limit: args.replica_retry_limit,
                    parallelism: args.parallelism,
                    replica_completion_count: args.replica_completion_count,
                },
                registries: read_all::<RegistryCredentials>(&args.registries)?,
                template: read_fragment::<JobTemplate>(&args.template)?,
                identities: args.identities,
            };
            print_json(&commands::create_app_job(&session, &target, &job).await?)?;
        }
        Commands::StartJob(args) => {
            let env = plain_then_secret(args.env, args.secret_env);
            let overrides = StartOverrides {
                template: args
                    .execution_template
                    .as_deref()
                    .map(read_fragment::<ExecutionTemplate>)
                    .transpose()?,
                command: args.command,
                env: (!env.is_empty()).then_some(env),
            };

            match commands::start_job(&session, &args.job.locator(config), overrides).await? {
                Some(execution) => print_json(&execution)?,
                None => println!("==> Job execution started"),
            }
        }
        Commands::RemoveApp(args) => {
            commands::remove_app(&session, &args.locator(config)).await?;
            println!("==> Removed container app");
        }
        Commands::RemoveAppJob(args) => {
            commands::remove_app_job(&session, &args.locator(config)).await?;
            println!("==> Removed container app job");
        }
        Commands::RemoveContainerGroup(args) => {
            commands::remove_container_group(&session, &args.locator(config)).await?;
            println!("==> Removed container group");
        }
        Commands::New(args) => execute_new(args.command)?,
    }

    Ok(())
}

fn container_group_config(
    args: CreateContainerGroupArgs,
    config: &Config,
) -> Result<ContainerGroupConfig> {
    let network = match args.ip_address_type {
        IpAddressType::Private => GroupNetwork::Private {
            subnet_ids: args.subnet_ids,
        },
        IpAddressType::Public => GroupNetwork::Public {
            dns_name_label: args.dns_name_label,
            reuse_policy: Some(args.dns_name_label_reuse_policy),
        },
    };

    Ok(ContainerGroupConfig {
        location: args.location.or_else(|| config.location.clone()),
        os_type: args.os_type,
        restart_policy: args.restart_policy,
        sku: args.sku,
        containers: read_all::<ContainerInstance>(&args.containers)?,
        registries: read_all::<GroupRegistryCredential>(&args.registries)?,
        identities: args.identities,
        ports: args
            .ports
            .into_iter()
            .map(|(port, protocol)| group_port(port, protocol))
            .collect(),
        network,
    })
}

fn execute_new(command: NewCommands) -> Result<()> {
    match command {
        NewCommands::Ingress(args) => print_json(
            &IngressConfig {
                external: args.external,
                target_port: args.target_port,
                exposed_port: args.exposed_port,
                transport: args.transport,
                traffic: read_all::<TrafficWeight>(&args.traffic)?,
            }
            .build(),
        ),
        NewCommands::TrafficWeight(args) => print_json(
            &TrafficWeightConfig {
                revision_name: args.revision_name,
                weight: args.weight,
                label: args.label,
                latest_revision: args.latest_revision,
            }
            .build(),
        ),
        NewCommands::AppTemplate(args) => print_json(
            &AppTemplateConfig {
                revision_suffix: args.revision_suffix,
                image: args.image,
                name: args.name,
                cpu: args.cpu,
                memory: args.memory,
            }
            .build(),
        ),
        NewCommands::JobTemplate(args) => print_json(&args.into_config().job_template()),
        NewCommands::JobExecutionTemplate(args) => {
            print_json(&args.into_config().execution_template())
        }
        NewCommands::AppRegistryCredential(args) => {
            let auth = registry_auth(args.identity, args.username, args.password_secret_ref)?;
            print_json(&RegistryConfig { server: args.server, auth }.app_credentials())
        }
        NewCommands::GroupRegistryCredential(args) => {
            let auth = registry_auth(args.identity, args.username, args.password)?;
            print_json(&RegistryConfig { server: args.server, auth }.group_credentials())
        }
        NewCommands::Container(args) => {
            let env = plain_then_secret(args.env, args.secure_env);
            print_json(
                &ContainerInstanceConfig {
                    name: args.name,
                    image: args.image,
                    cpu: args.cpu,
                    memory_in_gb: args.memory_in_gb,
                    command: args.command,
                    ports: args
                        .ports
                        .into_iter()
                        .map(|(port, protocol)| container_port(port, protocol))
                        .collect(),
                    env,
                }
                .build(),
            )
        }
        NewCommands::GroupPort(args) => print_json(&group_port(args.port, Some(args.protocol))),
        NewCommands::ContainerPort(args) => {
            print_json(&container_port(args.port, Some(args.protocol)))
        }
    }
}

fn registry_auth(
    identity: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<RegistryAuth> {
    match (identity, username, password) {
        (Some(identity), None, None) => Ok(RegistryAuth::Identity(identity)),
        (None, Some(username), Some(password)) => {
            Ok(RegistryAuth::UserPassword { username, password })
        }
        _ => bail!("registry credentials need either --identity or --username with a password"),
    }
}

impl JobContainerArgs {
    fn into_config(self) -> JobContainerConfig {
        let env = plain_then_secret(self.env, self.secret_env);
        JobContainerConfig {
            image: self.image,
            name: self.name,
            command: self.command,
            env,
            cpu: self.cpu,
            memory: self.memory,
        }
    }
}

impl LocatorArgs {
    fn locator(&self, config: &Config) -> ResourceLocator {
        ResourceLocator::from_parts(
            self.resource_id.clone(),
            self.subscription_id
                .clone()
                .or_else(|| config.subscription_id.clone()),
            self.resource_group.clone(),
            self.name.clone(),
        )
    }
}

impl TargetArgs {
    fn locator(&self, config: &Config) -> ResourceLocator {
        ResourceLocator::from_parts(
            self.resource_id.clone(),
            self.subscription_id
                .clone()
                .or_else(|| config.subscription_id.clone()),
            self.resource_group.clone(),
            self.name.clone(),
        )
    }
}

impl CreateTargetArgs {
    fn create_target(&self, config: &Config) -> CreateTarget {
        CreateTarget {
            subscription_id: self
                .subscription_id
                .clone()
                .or_else(|| config.subscription_id.clone()),
            resource_group: self.resource_group.clone(),
            name: self.name.clone(),
        }
    }
}

/// Plain entries keep their command-line order, then secret entries keep theirs.
fn plain_then_secret(mut plain: Vec<EnvVarInput>, secret: Vec<EnvVarInput>) -> Vec<EnvVarInput> {
    plain.extend(secret);
    plain
}

fn read_all<T: serde::de::DeserializeOwned>(paths: &[PathBuf]) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for path in paths {
        items.extend(read_fragments::<T>(path)?);
    }
    Ok(items)
}

fn print_output(output: Output<JsonValue>) -> Result<()> {
    match output {
        Output::Nothing => {
            tracing::info!("no matching resources");
            Ok(())
        }
        Output::One(item) => print_json(&item),
        Output::Many(items) => print_json(&items),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
