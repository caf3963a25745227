use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{scope_to_resource, AccessToken, TokenCredential};
use crate::error::{AzError, Result};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Probing IMDS off-Azure should fail fast.
const IMDS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    /// Azure VM / VMSS instance metadata service.
    Imds(String),
    /// App Service, Functions and Container Apps identity endpoint.
    AppService { url: String, header: String },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix seconds, as a string on IMDS and a number on some hosts.
    expires_on: JsonValue,
}

/// Managed identity token, for a specific client id or the ambient identity.
pub struct ManagedIdentityCredential {
    client_id: Option<String>,
    endpoint: Endpoint,
    http: reqwest::Client,
}

impl ManagedIdentityCredential {
    /// Picks the hosting environment's identity endpoint from `IDENTITY_ENDPOINT`
    /// and `IDENTITY_HEADER`, falling back to IMDS.
    pub fn new(client_id: Option<String>, http: reqwest::Client) -> Self {
        let endpoint = match (
            std::env::var("IDENTITY_ENDPOINT").ok(),
            std::env::var("IDENTITY_HEADER").ok(),
        ) {
            (Some(url), Some(header)) if !url.is_empty() && !header.is_empty() => {
                Endpoint::AppService { url, header }
            }
            _ => Endpoint::Imds(IMDS_ENDPOINT.to_string()),
        };

        Self {
            client_id,
            endpoint,
            http,
        }
    }

    /// Target an IMDS-compatible endpoint explicitly.
    pub fn with_imds_endpoint(
        client_id: Option<String>,
        endpoint: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            endpoint: Endpoint::Imds(endpoint.into()),
            http,
        }
    }

    fn request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut query: Vec<(&str, &str)> = vec![("resource", resource)];

        let builder = match &self.endpoint {
            Endpoint::Imds(url) => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(url)
                    .header("Metadata", "true")
                    .timeout(IMDS_PROBE_TIMEOUT)
            }
            Endpoint::AppService { url, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http.get(url).header("X-IDENTITY-HEADER", header)
            }
        };

        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id));
        }

        builder.query(&query)
    }
}

fn parse_expires_on(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let response = self
            .request(scope_to_resource(scope))
            .send()
            .await
            .map_err(|e| AzError::unexpected(format!("managed identity endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AzError::unexpected(format!(
                "managed identity endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| AzError::unexpected(format!("malformed managed identity token: {}", e)))?;

        let expires_on = parse_expires_on(&parsed.expires_on)
            .and_then(|unix| Utc.timestamp_opt(unix, 0).single())
            .ok_or_else(|| AzError::unexpected("managed identity token carried no expiry"))?;

        Ok(AccessToken::new(parsed.access_token, expires_on))
    }
}
