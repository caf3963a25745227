//! Session-scoped cache of the authenticated management client.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::arm::{ArmClient, ManagementClient, MANAGEMENT_ENDPOINT};
use crate::auth::{default_credential, MANAGED_IDENTITY_CLIENT_ID_ENV, MANAGEMENT_SCOPE};
use crate::error::{AzError, Result};
use crate::lro::PollConfig;

/// Constructs authenticated management clients.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ManagementClient>>;
}

/// Builds an `ArmClient` over the default credential chain.
pub struct ArmClientFactory {
    endpoint: String,
    managed_identity_client_id: Option<String>,
}

impl ArmClientFactory {
    /// Reads the managed identity client id from the environment.
    pub fn from_env() -> Self {
        Self {
            endpoint: MANAGEMENT_ENDPOINT.to_string(),
            managed_identity_client_id: std::env::var(MANAGED_IDENTITY_CLIENT_ID_ENV).ok(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ClientFactory for ArmClientFactory {
    async fn connect(&self) -> Result<Arc<dyn ManagementClient>> {
        let credential =
            default_credential(self.managed_identity_client_id.clone(), reqwest::Client::new());

        // Probe once so a chain with no usable credential fails here, not on first use.
        credential.get_token(MANAGEMENT_SCOPE).await.map_err(|e| match e {
            AzError::AuthenticationUnavailable(_) => e,
            other => AzError::AuthenticationUnavailable(other.to_string()),
        })?;

        let client = ArmClient::with_endpoint(credential, &self.endpoint)?;
        Ok(Arc::new(client))
    }
}

/// Holds at most one connected client for the lifetime of the value.
pub struct Session {
    factory: Box<dyn ClientFactory>,
    client: Mutex<Option<Arc<dyn ManagementClient>>>,
    poll: PollConfig,
}

impl Session {
    pub fn new(factory: impl ClientFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            client: Mutex::new(None),
            poll: PollConfig::default(),
        }
    }

    /// A session already holding `client`.
    pub fn with_client(client: Arc<dyn ManagementClient>) -> Self {
        struct Preconnected(Arc<dyn ManagementClient>);

        #[async_trait]
        impl ClientFactory for Preconnected {
            async fn connect(&self) -> Result<Arc<dyn ManagementClient>> {
                Ok(self.0.clone())
            }
        }

        Self {
            factory: Box::new(Preconnected(client.clone())),
            client: Mutex::new(Some(client)),
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Return the cached client, constructing one when none is cached or `force` is set.
    ///
    /// A failed construction leaves the cache untouched.
    pub async fn connect(&self, force: bool) -> Result<Arc<dyn ManagementClient>> {
        let mut cached = self.client.lock().await;

        if !force {
            if let Some(client) = cached.as_ref() {
                debug!("reusing cached management client");
                return Ok(client.clone());
            }
        }

        let client = self.factory.connect().await?;
        info!(endpoint = client.endpoint(), force, "connected to management endpoint");
        *cached = Some(client.clone());
        Ok(client)
    }

    /// The connected client; `PreconditionMissing` if `connect` never succeeded.
    pub async fn require_client(&self) -> Result<Arc<dyn ManagementClient>> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or(AzError::PreconditionMissing(
                "ARM client not found in session state; run connect first",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::fake::FakeClient;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingFactory {
        built: AtomicU32,
        fail: bool,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                built: AtomicU32::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ClientFactory for Arc<CountingFactory> {
        async fn connect(&self) -> Result<Arc<dyn ManagementClient>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AzError::AuthenticationUnavailable("no credentials".into()));
            }
            Ok(Arc::new(FakeClient::new("sub-1")))
        }
    }

    #[tokio::test]
    async fn test_connect_twice_returns_same_handle() {
        let factory = Arc::new(CountingFactory::new());
        let session = Session::new(factory.clone());

        let first = session.connect(false).await.unwrap();
        let second = session.connect(false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_connect_builds_new_handle() {
        let factory = Arc::new(CountingFactory::new());
        let session = Session::new(factory.clone());

        let first = session.connect(false).await.unwrap();
        let forced = session.connect(true).await.unwrap();
        let after = session.require_client().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &forced));
        assert!(Arc::ptr_eq(&forced, &after));
        assert_eq!(factory.built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_connect_caches_nothing() {
        let factory = Arc::new(CountingFactory {
            fail: true,
            ..CountingFactory::new()
        });
        let session = Session::new(factory.clone());

        let err = session
            .connect(false)
            .await
            .err()
            .expect("connect should fail");
        assert_eq!(err.category(), "AuthenticationUnavailable");

        assert!(session.connect(false).await.is_err());
        assert_eq!(factory.built.load(Ordering::SeqCst), 2);

        let err = session
            .require_client()
            .await
            .err()
            .expect("no client should be cached");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_require_client_before_connect_is_fatal() {
        let session = Session::new(Arc::new(CountingFactory::new()));
        let err = session
            .require_client()
            .await
            .err()
            .expect("no client should be cached");
        assert_eq!(err.category(), "PreconditionMissing");
    }
}
