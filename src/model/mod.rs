//! Desired-state documents sent to and read from the management API.
//!
//! Only the fields this crate reads or writes are modelled. Everything is
//! camelCase on the wire.

mod app;
mod group;

pub use app::{
    ActiveRevisionsMode, AppContainer, AppTemplate, ContainerAppConfiguration, ContainerAppDocument,
    ContainerAppProperties, ExecutionContainer, ExecutionTemplate, Ingress, IngressTransport,
    JobConfiguration, JobDocument, JobProperties, JobTemplate, ManualTriggerConfig,
    RegistryCredentials, TrafficWeight, TriggerType,
};
pub use group::{
    ContainerGroupDocument, ContainerGroupProperties, ContainerInstance,
    ContainerInstanceProperties, ContainerPort, DnsNameLabelReusePolicy, GroupPort,
    GroupRegistryCredential, GroupSku, IpAddress, IpAddressType, OsType, Protocol,
    ResourceRequests, ResourceRequirements, RestartPolicy, SecureEnvironmentVariable, SubnetId,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declares a string-valued enum with case-insensitive parsing.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
        default = $default:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const VARIANTS: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($wire) {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!(
                    "'{}' is not a valid {}. Allowed: {}",
                    s,
                    stringify!($name),
                    Self::VARIANTS.join(", ")
                ))
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use string_enum;

string_enum! {
    pub enum IdentityType {
        None => "None",
        SystemAssigned => "SystemAssigned",
        UserAssigned => "UserAssigned",
        SystemAndUserAssigned => "SystemAssigned,UserAssigned",
    }
    default = None;
}

/// Marker value stored against each user-assigned identity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAssignedIdentity {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedIdentity {
    #[serde(rename = "type")]
    pub identity_type: IdentityType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_assigned_identities: BTreeMap<String, UserAssignedIdentity>,
}

/// Environment variable of a container-app or job container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

impl EnvironmentVariable {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            secret_ref: None,
        }
    }

    pub fn secret_ref(name: impl Into<String>, secret_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            secret_ref: Some(secret_ref.into()),
        }
    }
}

/// CPU and memory of a container-app or job container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ContainerResources {
    pub fn new(cpu: f64, memory: impl Into<String>) -> Self {
        Self {
            cpu: Some(cpu),
            memory: Some(memory.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_parses_case_insensitively() {
        assert_eq!(
            "systemassigned".parse::<IdentityType>().unwrap(),
            IdentityType::SystemAssigned
        );
        let err = "bogus".parse::<IdentityType>().unwrap_err();
        assert!(err.contains("Allowed: None, SystemAssigned"));
    }

    #[test]
    fn test_identity_serializes_user_assigned_map() {
        let mut identity = ManagedIdentity {
            identity_type: IdentityType::UserAssigned,
            ..Default::default()
        };
        identity
            .user_assigned_identities
            .insert("/id/a".into(), UserAssignedIdentity {});

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "UserAssigned",
                "userAssignedIdentities": { "/id/a": {} }
            })
        );
    }

    #[test]
    fn test_env_var_omits_absent_fields() {
        let json = serde_json::to_value(EnvironmentVariable::secret_ref("TOKEN", "tok")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "TOKEN", "secretRef": "tok" }));
    }
}
