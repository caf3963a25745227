//! Pure builders turning flat parameter sets into desired-state documents.
//!
//! Nothing here touches the network. Fragments (containers, ports, ingress,
//! registry credentials) are built separately and embedded by the resource
//! builders in [`app`] and [`group`].

pub mod app;
pub mod group;

pub use app::{
    AppTemplateConfig, ContainerAppConfig, ContainerAppJobConfig, IngressConfig, JobContainerConfig,
    JobTriggerConfig, TrafficWeightConfig,
};
pub use group::{
    container_port, group_port, ContainerGroupConfig, ContainerInstanceConfig, GroupNetwork,
};

use serde::Deserialize;
use tracing::warn;

use crate::model::{
    EnvironmentVariable, GroupRegistryCredential, IdentityType, ManagedIdentity,
    RegistryCredentials, SecureEnvironmentVariable, UserAssignedIdentity,
};

pub const DEFAULT_LOCATION: &str = "East US";

/// Identity value selecting the system-assigned identity.
pub const SYSTEM_IDENTITY: &str = "system";

/// Identity block for a set of identity values.
///
/// `"system"` enables the system-assigned identity; every other non-empty
/// value is a user-assigned identity resource id. Repeated ids collapse.
pub fn identity<S: AsRef<str>>(values: &[S]) -> Option<ManagedIdentity> {
    let mut system = false;
    let mut identity = ManagedIdentity::default();

    for value in values.iter().map(|v| v.as_ref().trim()).filter(|v| !v.is_empty()) {
        if value == SYSTEM_IDENTITY {
            system = true;
        } else {
            identity
                .user_assigned_identities
                .insert(value.to_string(), UserAssignedIdentity {});
        }
    }

    identity.identity_type = match (system, identity.user_assigned_identities.is_empty()) {
        (false, true) => return None,
        (true, true) => IdentityType::SystemAssigned,
        (false, false) => IdentityType::UserAssigned,
        (true, false) => IdentityType::SystemAndUserAssigned,
    };
    Some(identity)
}

/// One environment variable as supplied by the caller.
///
/// `secret` is a secret reference for apps and jobs, and a secure value for
/// container instances.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarInput {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, alias = "secretRef", alias = "secureValue")]
    pub secret: Option<String>,
}

impl EnvVarInput {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            secret: None,
        }
    }

    pub fn secret(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            secret: Some(secret.into()),
        }
    }
}

/// App and job env entries. A plain value wins over a secret reference.
///
/// Entries carrying neither are skipped with a warning rather than rejected.
pub fn app_env(inputs: &[EnvVarInput]) -> Vec<EnvironmentVariable> {
    inputs
        .iter()
        .filter_map(|input| match (&input.value, &input.secret) {
            (Some(value), _) => Some(EnvironmentVariable::value(&input.name, value)),
            (None, Some(secret)) => Some(EnvironmentVariable::secret_ref(&input.name, secret)),
            (None, None) => {
                warn!(name = %input.name, "environment variable has neither value nor secret reference; skipped");
                None
            }
        })
        .collect()
}

/// Container-instance env entries. A plain value wins over a secure value.
pub fn instance_env(inputs: &[EnvVarInput]) -> Vec<SecureEnvironmentVariable> {
    inputs
        .iter()
        .filter_map(|input| match (&input.value, &input.secret) {
            (Some(value), _) => Some(SecureEnvironmentVariable {
                name: input.name.clone(),
                value: Some(value.clone()),
                secure_value: None,
            }),
            (None, Some(secret)) => Some(SecureEnvironmentVariable {
                name: input.name.clone(),
                value: None,
                secure_value: Some(secret.clone()),
            }),
            (None, None) => {
                warn!(name = %input.name, "environment variable has neither value nor secure value; skipped");
                None
            }
        })
        .collect()
}

/// How a registry is authenticated. Chosen by the caller up front.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryAuth {
    /// Managed identity resource id (or `"system"`).
    Identity(String),
    /// Username plus a password: a secret reference for apps, the password
    /// itself for container groups.
    UserPassword { username: String, password: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub server: String,
    pub auth: RegistryAuth,
}

impl RegistryConfig {
    pub fn app_credentials(&self) -> RegistryCredentials {
        let mut credentials = RegistryCredentials {
            server: self.server.clone(),
            ..Default::default()
        };
        match &self.auth {
            RegistryAuth::Identity(identity) => credentials.identity = Some(identity.clone()),
            RegistryAuth::UserPassword { username, password } => {
                credentials.username = Some(username.clone());
                credentials.password_secret_ref = Some(password.clone());
            }
        }
        credentials
    }

    pub fn group_credentials(&self) -> GroupRegistryCredential {
        let mut credentials = GroupRegistryCredential {
            server: self.server.clone(),
            ..Default::default()
        };
        match &self.auth {
            RegistryAuth::Identity(identity) => credentials.identity = Some(identity.clone()),
            RegistryAuth::UserPassword { username, password } => {
                credentials.username = Some(username.clone());
                credentials.password = Some(password.clone());
            }
        }
        credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UAMI: &str =
        "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/id1";

    #[test]
    fn test_identity_system() {
        let identity = identity(&["system"]).unwrap();
        assert_eq!(identity.identity_type, IdentityType::SystemAssigned);
        assert!(identity.user_assigned_identities.is_empty());
    }

    #[test]
    fn test_duplicate_user_identity_collapses() {
        let identity = identity(&[UAMI, UAMI]).unwrap();
        assert_eq!(identity.identity_type, IdentityType::UserAssigned);
        assert_eq!(identity.user_assigned_identities.len(), 1);
        assert!(identity.user_assigned_identities.contains_key(UAMI));
    }

    #[test]
    fn test_identity_mixed_and_empty() {
        assert_eq!(
            identity(&["system", UAMI]).unwrap().identity_type,
            IdentityType::SystemAndUserAssigned
        );
        assert!(identity::<&str>(&[]).is_none());
        assert!(identity(&["", "  "]).is_none());
    }

    #[test]
    fn test_app_env_prefers_value_and_skips_empty_entries() {
        let env = app_env(&[
            EnvVarInput::value("A", "1"),
            EnvVarInput::secret("B", "b-secret"),
            EnvVarInput {
                name: "C".into(),
                value: Some("3".into()),
                secret: Some("ignored".into()),
            },
            EnvVarInput {
                name: "D".into(),
                ..Default::default()
            },
        ]);

        assert_eq!(
            env,
            vec![
                EnvironmentVariable::value("A", "1"),
                EnvironmentVariable::secret_ref("B", "b-secret"),
                EnvironmentVariable::value("C", "3"),
            ]
        );
    }

    #[test]
    fn test_instance_env_uses_secure_value() {
        let env = instance_env(&[EnvVarInput::secret("PASSWORD", "hunter2")]);
        assert_eq!(env[0].secure_value.as_deref(), Some("hunter2"));
        assert_eq!(env[0].value, None);
    }

    #[test]
    fn test_env_input_accepts_secret_aliases() {
        let input: EnvVarInput =
            serde_json::from_str(r#"{"name":"TOKEN","secretRef":"tok"}"#).unwrap();
        assert_eq!(input, EnvVarInput::secret("TOKEN", "tok"));
    }

    #[test]
    fn test_registry_credentials_shapes() {
        let by_identity = RegistryConfig {
            server: "acr.azurecr.io".into(),
            auth: RegistryAuth::Identity(UAMI.into()),
        };
        let app = by_identity.app_credentials();
        assert_eq!(app.identity.as_deref(), Some(UAMI));
        assert_eq!(app.username, None);

        let by_password = RegistryConfig {
            server: "acr.azurecr.io".into(),
            auth: RegistryAuth::UserPassword {
                username: "user".into(),
                password: "registry-pw".into(),
            },
        };
        assert_eq!(
            by_password.app_credentials().password_secret_ref.as_deref(),
            Some("registry-pw")
        );
        let group = by_password.group_credentials();
        assert_eq!(group.password.as_deref(), Some("registry-pw"));
        assert_eq!(group.identity, None);
    }
}
