//! Container groups (`Microsoft.ContainerInstance/containerGroups`).

use serde::{Deserialize, Serialize};

use super::{string_enum, ManagedIdentity};

string_enum! {
    pub enum OsType {
        Linux => "Linux",
        Windows => "Windows",
    }
    default = Linux;
}

string_enum! {
    pub enum RestartPolicy {
        Always => "Always",
        OnFailure => "OnFailure",
        Never => "Never",
    }
    default = Always;
}

string_enum! {
    pub enum GroupSku {
        Standard => "Standard",
        Confidential => "Confidential",
        Dedicated => "Dedicated",
    }
    default = Standard;
}

string_enum! {
    pub enum IpAddressType {
        Public => "Public",
        Private => "Private",
    }
    default = Public;
}

string_enum! {
    pub enum DnsNameLabelReusePolicy {
        NoReuse => "NoReuse",
        ResourceGroupReuse => "ResourceGroupReuse",
        SubscriptionReuse => "SubscriptionReuse",
        TenantReuse => "TenantReuse",
        Unsecure => "Unsecure",
    }
    default = NoReuse;
}

string_enum! {
    pub enum Protocol {
        Tcp => "Tcp",
        Udp => "Udp",
    }
    default = Tcp;
}

/// Port exposed by a single container instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

/// Port exposed on the group's IP address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPort {
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureEnvironmentVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequests {
    #[serde(rename = "memoryInGB")]
    pub memory_in_gb: f64,
    pub cpu: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    pub requests: ResourceRequests,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInstanceProperties {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<SecureEnvironmentVariable>,
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInstance {
    pub name: String,
    pub properties: ContainerInstanceProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRegistryCredential {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    #[serde(rename = "type")]
    pub address_type: IpAddressType,
    #[serde(default)]
    pub ports: Vec<GroupPort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_generated_domain_name_label_scope: Option<DnsNameLabelReusePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetId {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGroupProperties {
    pub sku: GroupSku,
    pub os_type: OsType,
    pub restart_policy: RestartPolicy,
    pub containers: Vec<ContainerInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_registry_credentials: Vec<GroupRegistryCredential>,
    pub ip_address: IpAddress,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_ids: Vec<SubnetId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGroupDocument {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedIdentity>,
    pub properties: ContainerGroupProperties,
}
