//! Credential chain for the management audience.
//!
//! Resolution order:
//! 1. `MANAGED_IDENTITY_CLIENT_ID` set: managed identity for that client id only.
//! 2. Otherwise Azure PowerShell session, then Azure CLI session, then ambient
//!    managed identity. The first credential that yields a token wins.

mod cli;
mod managed_identity;

pub use cli::{AzureCliCredential, AzurePowerShellCredential};
pub use managed_identity::ManagedIdentityCredential;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AzError, Result};

/// Token scope of the Azure Resource Manager audience.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

pub const MANAGED_IDENTITY_CLIENT_ID_ENV: &str = "MANAGED_IDENTITY_CLIENT_ID";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.expires_on - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > Utc::now()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// Resource URI for a `.default` scope (`https://x/.default` -> `https://x`).
pub(crate) fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Tries each credential in order and returns the first token obtained.
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    fn name(&self) -> &'static str {
        "ChainedTokenCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!(credential = source.name(), "acquired token");
                    return Ok(token);
                }
                Err(e) => {
                    debug!(credential = source.name(), error = %e, "credential unavailable");
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        Err(AzError::AuthenticationUnavailable(if failures.is_empty() {
            "no credentials configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}

/// Caches the most recent token of an inner credential until it nears expiry.
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    cached: Mutex<Option<(String, AccessToken)>>,
}

impl CachedCredential {
    pub fn new(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some((cached_scope, token)) = cached.as_ref() {
            if cached_scope == scope && token.is_fresh() {
                return Ok(token.clone());
            }
        }

        let token = self.inner.get_token(scope).await?;
        *cached = Some((scope.to_string(), token.clone()));
        Ok(token)
    }
}

/// Build the credential used to authenticate management calls.
pub fn default_credential(
    managed_identity_client_id: Option<String>,
    http: reqwest::Client,
) -> Arc<dyn TokenCredential> {
    let inner: Arc<dyn TokenCredential> =
        match managed_identity_client_id.filter(|id| !id.is_empty()) {
            Some(client_id) => {
                debug!(client_id = %client_id, "using managed identity credential");
                Arc::new(ManagedIdentityCredential::new(Some(client_id), http))
            }
            None => {
                debug!("using chained credential: PowerShell -> Azure CLI -> managed identity");
                Arc::new(ChainedTokenCredential::new(vec![
                    Arc::new(AzurePowerShellCredential::new()),
                    Arc::new(AzureCliCredential::new()),
                    Arc::new(ManagedIdentityCredential::new(None, http)),
                ]))
            }
        };

    Arc::new(CachedCredential::new(inner))
}
