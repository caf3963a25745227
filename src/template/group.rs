//! Container instance and container group documents.

use super::{identity, instance_env, EnvVarInput, DEFAULT_LOCATION};
use crate::error::{AzError, Result};
use crate::model::{
    ContainerGroupDocument, ContainerGroupProperties, ContainerInstance,
    ContainerInstanceProperties, ContainerPort, DnsNameLabelReusePolicy, GroupPort,
    GroupRegistryCredential, GroupSku, IpAddress, IpAddressType, OsType, Protocol,
    ResourceRequests, ResourceRequirements, RestartPolicy, SubnetId,
};

const DEFAULT_CPU: f64 = 2.0;
const DEFAULT_MEMORY_GB: f64 = 3.0;

pub fn container_port(port: u16, protocol: Option<Protocol>) -> ContainerPort {
    ContainerPort {
        port,
        protocol: protocol.unwrap_or_default(),
    }
}

pub fn group_port(port: u16, protocol: Option<Protocol>) -> GroupPort {
    GroupPort {
        port,
        protocol: protocol.unwrap_or_default(),
    }
}

/// One container of a container group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerInstanceConfig {
    pub name: String,
    pub image: String,
    /// Cores; 2 when absent.
    pub cpu: Option<f64>,
    /// GB; 3 when absent.
    pub memory_in_gb: Option<f64>,
    pub command: Vec<String>,
    pub ports: Vec<ContainerPort>,
    pub env: Vec<EnvVarInput>,
}

impl ContainerInstanceConfig {
    pub fn build(&self) -> ContainerInstance {
        ContainerInstance {
            name: self.name.clone(),
            properties: ContainerInstanceProperties {
                image: self.image.clone(),
                command: self.command.clone(),
                ports: self.ports.clone(),
                environment_variables: instance_env(&self.env),
                resources: ResourceRequirements {
                    requests: ResourceRequests {
                        memory_in_gb: self.memory_in_gb.unwrap_or(DEFAULT_MEMORY_GB),
                        cpu: self.cpu.unwrap_or(DEFAULT_CPU),
                    },
                },
            },
        }
    }
}

/// Network placement of a container group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupNetwork {
    /// Public IP. The DNS label defaults to the group name.
    Public {
        dns_name_label: Option<String>,
        reuse_policy: Option<DnsNameLabelReusePolicy>,
    },
    /// Private IP inside one or more subnets.
    Private { subnet_ids: Vec<String> },
}

impl Default for GroupNetwork {
    fn default() -> Self {
        GroupNetwork::Public {
            dns_name_label: None,
            reuse_policy: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerGroupConfig {
    pub location: Option<String>,
    pub os_type: OsType,
    pub restart_policy: RestartPolicy,
    pub sku: GroupSku,
    pub containers: Vec<ContainerInstance>,
    pub registries: Vec<GroupRegistryCredential>,
    pub identities: Vec<String>,
    pub ports: Vec<GroupPort>,
    pub network: GroupNetwork,
}

impl ContainerGroupConfig {
    /// Document for a group called `name`.
    pub fn build(&self, name: &str) -> Result<ContainerGroupDocument> {
        if self.containers.is_empty() {
            return Err(AzError::unexpected(format!(
                "container group '{}' needs at least one container",
                name
            )));
        }

        let mut ip_address = IpAddress {
            ports: self.ports.clone(),
            ..Default::default()
        };
        let mut subnet_ids = Vec::new();

        match &self.network {
            GroupNetwork::Public {
                dns_name_label,
                reuse_policy,
            } => {
                ip_address.address_type = IpAddressType::Public;
                ip_address.dns_name_label = Some(
                    dns_name_label
                        .clone()
                        .filter(|label| !label.is_empty())
                        .unwrap_or_else(|| name.to_string()),
                );
                ip_address.auto_generated_domain_name_label_scope =
                    Some(reuse_policy.unwrap_or_default());
            }
            GroupNetwork::Private { subnet_ids: ids } => {
                let ids: Vec<&String> = ids.iter().filter(|id| !id.is_empty()).collect();
                if ids.is_empty() {
                    return Err(AzError::unexpected(format!(
                        "container group '{}' uses a private IP address but no subnet id was given",
                        name
                    )));
                }
                ip_address.address_type = IpAddressType::Private;
                subnet_ids = ids
                    .into_iter()
                    .map(|id| SubnetId { id: id.clone() })
                    .collect();
            }
        }

        Ok(ContainerGroupDocument {
            location: self
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            identity: identity(&self.identities),
            properties: ContainerGroupProperties {
                sku: self.sku,
                os_type: self.os_type,
                restart_policy: self.restart_policy,
                containers: self.containers.clone(),
                image_registry_credentials: self.registries.clone(),
                ip_address,
                subnet_ids,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nginx() -> ContainerInstance {
        ContainerInstanceConfig {
            name: "web".into(),
            image: "nginx:latest".into(),
            ..Default::default()
        }
        .build()
    }

    #[test]
    fn test_container_instance_defaults() {
        let container = nginx();
        assert_eq!(container.properties.resources.requests.cpu, 2.0);
        assert_eq!(container.properties.resources.requests.memory_in_gb, 3.0);
        assert!(container.properties.command.is_empty());
    }

    #[test]
    fn test_public_group_defaults_dns_label_to_name() {
        let document = ContainerGroupConfig {
            containers: vec![nginx()],
            ..Default::default()
        }
        .build("demo")
        .unwrap();

        let ip = &document.properties.ip_address;
        assert_eq!(ip.address_type, IpAddressType::Public);
        assert_eq!(ip.dns_name_label.as_deref(), Some("demo"));
        assert_eq!(
            ip.auto_generated_domain_name_label_scope,
            Some(DnsNameLabelReusePolicy::NoReuse)
        );
        assert_eq!(document.location, "East US");
        assert!(document.identity.is_none());
    }

    #[test]
    fn test_public_group_wire_shape() {
        let document = ContainerGroupConfig {
            containers: vec![nginx()],
            ports: vec![group_port(80, None)],
            network: GroupNetwork::Public {
                dns_name_label: Some("demo-label".into()),
                reuse_policy: Some(DnsNameLabelReusePolicy::TenantReuse),
            },
            ..Default::default()
        }
        .build("demo")
        .unwrap();

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(
            json["properties"]["ipAddress"],
            json!({
                "type": "Public",
                "ports": [{ "port": 80, "protocol": "Tcp" }],
                "dnsNameLabel": "demo-label",
                "autoGeneratedDomainNameLabelScope": "TenantReuse"
            })
        );
        assert_eq!(json["properties"]["osType"], "Linux");
        assert_eq!(json["properties"]["restartPolicy"], "Always");
        assert_eq!(json["properties"]["sku"], "Standard");
        assert_eq!(
            json["properties"]["containers"][0]["properties"]["resources"]["requests"],
            json!({ "memoryInGB": 3.0, "cpu": 2.0 })
        );
    }

    #[test]
    fn test_private_group_requires_subnet() {
        let err = ContainerGroupConfig {
            containers: vec![nginx()],
            network: GroupNetwork::Private { subnet_ids: vec![] },
            ..Default::default()
        }
        .build("demo")
        .unwrap_err();
        assert_eq!(err.category(), "UnexpectedError");
    }

    #[test]
    fn test_private_group_records_each_subnet() {
        let document = ContainerGroupConfig {
            containers: vec![nginx()],
            network: GroupNetwork::Private {
                subnet_ids: vec!["/subnets/a".into(), "/subnets/b".into()],
            },
            ..Default::default()
        }
        .build("demo")
        .unwrap();

        assert_eq!(document.properties.subnet_ids.len(), 2);
        assert_eq!(document.properties.ip_address.address_type, IpAddressType::Private);
        assert_eq!(document.properties.ip_address.dns_name_label, None);
    }

    #[test]
    fn test_group_without_containers_is_rejected() {
        let err = ContainerGroupConfig::default()
            .build("empty")
            .unwrap_err();
        assert!(err.to_string().contains("at least one container"));
    }
}
