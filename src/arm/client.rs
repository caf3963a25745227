use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{LroState, ManagementClient, PendingOperation, PollStyle, ResourceGroup, Subscription};
use crate::auth::{TokenCredential, MANAGEMENT_SCOPE};
use crate::error::{AzError, BackendError, Result};
use crate::locator::{ResourceId, ResourceKind};

pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";
const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    value: Vec<JsonValue>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct AsyncOperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

/// Azure Resource Manager REST client.
pub struct ArmClient {
    client: Client,
    credential: Arc<dyn TokenCredential>,
    endpoint: String,
}

impl ArmClient {
    pub fn new(credential: Arc<dyn TokenCredential>) -> Result<Self> {
        Self::with_endpoint(credential, MANAGEMENT_ENDPOINT)
    }

    pub fn with_endpoint(credential: Arc<dyn TokenCredential>, endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azcontainer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AzError::unexpected(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credential,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    fn resource_url(&self, id: &ResourceId, suffix: &str) -> String {
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}{}",
            urlencoding::encode(&id.subscription_id),
            urlencoding::encode(&id.resource_group),
            id.kind.namespace(),
            id.kind.type_name(),
            urlencoding::encode(&id.name),
            suffix
        );
        self.url(&path, id.kind.api_version())
    }

    /// Send an authenticated request; non-success statuses become `Backend` errors.
    async fn send(&self, method: Method, url: &str, body: Option<&JsonValue>) -> Result<Response> {
        let token = self.credential.get_token(MANAGEMENT_SCOPE).await?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "management request");
        let response = request
            .send()
            .await
            .map_err(|e| AzError::unexpected(format!("{} {}: {}", method, url, e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(AzError::Backend(backend_error(response).await))
    }

    async fn get_json(&self, url: &str) -> Result<JsonValue> {
        let response = self.send(Method::GET, url, None).await?;
        read_body(response).await?.ok_or_else(|| AzError::unexpected("empty response body"))
    }

    /// GET a collection, following `nextLink` until exhausted.
    async fn get_paged(&self, url: &str) -> Result<Vec<JsonValue>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());

        while let Some(url) = next.take() {
            let page: Page = serde_json::from_value(self.get_json(&url).await?)?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }

    async fn begin(
        &self,
        method: Method,
        url: &str,
        body: Option<&JsonValue>,
        resource_url: Option<&str>,
    ) -> Result<LroState> {
        let response = self.send(method.clone(), url, body).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(response).await?;

        let retry_after = retry_after(&headers);
        let location = header_str(&headers, LOCATION.as_str());

        if let Some(status_url) = header_str(&headers, ASYNC_OPERATION_HEADER) {
            // PUT reads the resource afterwards, POST the Location result, DELETE nothing.
            let final_url = match method {
                Method::PUT => resource_url.map(str::to_string),
                Method::POST => location,
                _ => None,
            };
            return Ok(LroState::Pending(PendingOperation {
                status_url,
                style: PollStyle::AsyncOperation,
                final_url,
                retry_after,
            }));
        }

        if status == StatusCode::ACCEPTED {
            if let Some(status_url) = location {
                return Ok(LroState::Pending(PendingOperation {
                    status_url,
                    style: PollStyle::Location,
                    final_url: None,
                    retry_after,
                }));
            }
        }

        if method == Method::PUT {
            if let (Some(state), Some(resource_url)) = (provisioning_state(body.as_ref()), resource_url)
            {
                if !is_terminal(state) {
                    return Ok(LroState::Pending(PendingOperation {
                        status_url: resource_url.to_string(),
                        style: PollStyle::ProvisioningState,
                        final_url: None,
                        retry_after,
                    }));
                }
            }
        }

        Ok(LroState::Done(body))
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn provisioning_state(body: Option<&JsonValue>) -> Option<&str> {
    body?
        .get("properties")?
        .get("provisioningState")?
        .as_str()
}

fn is_terminal(state: &str) -> bool {
    ["Succeeded", "Failed", "Canceled", "Cancelled"]
        .iter()
        .any(|s| s.eq_ignore_ascii_case(state))
}

fn is_failure(state: &str) -> bool {
    !state.eq_ignore_ascii_case("Succeeded") && is_terminal(state)
}

async fn read_body(response: Response) -> Result<Option<JsonValue>> {
    let text = response
        .text()
        .await
        .map_err(|e| AzError::unexpected(format!("failed to read response body: {}", e)))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text)?))
}

async fn backend_error(response: Response) -> BackendError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorResponse>(&text)
        .ok()
        .and_then(|r| r.error)
    {
        Some(detail) => BackendError::new(status.as_u16(), detail.code, detail.message),
        None => BackendError::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            text.trim(),
        ),
    }
}

#[async_trait]
impl ManagementClient for ArmClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn default_subscription(&self) -> Result<Subscription> {
        let url = self.url("/subscriptions", SUBSCRIPTIONS_API_VERSION);
        let first = self
            .get_paged(&url)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AzError::unexpected("no subscriptions visible to the signed-in identity"))?;
        Ok(serde_json::from_value(first)?)
    }

    async fn subscription(&self, subscription_id: &str) -> Result<Subscription> {
        let path = format!("/subscriptions/{}", urlencoding::encode(subscription_id));
        let url = self.url(&path, SUBSCRIPTIONS_API_VERSION);
        Ok(serde_json::from_value(self.get_json(&url).await?)?)
    }

    async fn resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>> {
        let path = format!(
            "/subscriptions/{}/resourcegroups",
            urlencoding::encode(subscription_id)
        );
        let url = self.url(&path, RESOURCE_GROUPS_API_VERSION);
        self.get_paged(&url)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(AzError::from))
            .collect()
    }

    async fn resource_group(&self, subscription_id: &str, name: &str) -> Result<ResourceGroup> {
        let path = format!(
            "/subscriptions/{}/resourcegroups/{}",
            urlencoding::encode(subscription_id),
            urlencoding::encode(name)
        );
        let url = self.url(&path, RESOURCE_GROUPS_API_VERSION);
        Ok(serde_json::from_value(self.get_json(&url).await?)?)
    }

    async fn exists(&self, id: &ResourceId) -> Result<bool> {
        match self.get(id).await {
            Ok(_) => Ok(true),
            Err(AzError::Backend(e)) if e.status == StatusCode::NOT_FOUND.as_u16() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, id: &ResourceId) -> Result<JsonValue> {
        self.get_json(&self.resource_url(id, "")).await
    }

    async fn list(
        &self,
        subscription_id: &str,
        resource_group: &str,
        kind: ResourceKind,
    ) -> Result<Vec<JsonValue>> {
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            urlencoding::encode(subscription_id),
            urlencoding::encode(resource_group),
            kind.namespace(),
            kind.type_name()
        );
        self.get_paged(&self.url(&path, kind.api_version())).await
    }

    async fn begin_create_or_update(
        &self,
        id: &ResourceId,
        document: &JsonValue,
    ) -> Result<LroState> {
        let url = self.resource_url(id, "");
        self.begin(Method::PUT, &url, Some(document), Some(&url)).await
    }

    async fn begin_delete(&self, id: &ResourceId) -> Result<LroState> {
        let url = self.resource_url(id, "");
        self.begin(Method::DELETE, &url, None, None).await
    }

    async fn begin_start_job(&self, job: &ResourceId, template: &JsonValue) -> Result<LroState> {
        let url = self.resource_url(job, "/start");
        self.begin(Method::POST, &url, Some(template), None).await
    }

    async fn poll(&self, operation: &PendingOperation) -> Result<LroState> {
        let response = self.send(Method::GET, &operation.status_url, None).await?;
        let status = response.status();
        let retry_after = retry_after(response.headers()).or(operation.retry_after);
        let body = read_body(response).await?;

        let still_pending = || {
            LroState::Pending(PendingOperation {
                retry_after,
                ..operation.clone()
            })
        };

        match operation.style {
            PollStyle::AsyncOperation => {
                let parsed: AsyncOperationStatus = serde_json::from_value(
                    body.ok_or_else(|| AzError::unexpected("empty operation status"))?,
                )?;
                if parsed.status.eq_ignore_ascii_case("Succeeded") {
                    match &operation.final_url {
                        Some(url) => Ok(LroState::Done(Some(self.get_json(url).await?))),
                        None => Ok(LroState::Done(None)),
                    }
                } else if is_failure(&parsed.status) {
                    let detail = parsed.error.unwrap_or(ErrorDetail {
                        code: parsed.status.clone(),
                        message: format!("operation finished with status {}", parsed.status),
                    });
                    // The poll itself succeeded; its status is what gets reported.
                    Err(AzError::Backend(BackendError::new(
                        status.as_u16(),
                        detail.code,
                        detail.message,
                    )))
                } else {
                    Ok(still_pending())
                }
            }
            PollStyle::Location => {
                if status == StatusCode::ACCEPTED {
                    Ok(still_pending())
                } else {
                    Ok(LroState::Done(body))
                }
            }
            PollStyle::ProvisioningState => match provisioning_state(body.as_ref()) {
                Some(state) if is_failure(state) => Err(AzError::Backend(BackendError::new(
                    status.as_u16(),
                    state,
                    format!("provisioning finished with state {}", state),
                ))),
                Some(state) if !is_terminal(state) => Ok(still_pending()),
                _ => Ok(LroState::Done(body)),
            },
        }
    }

    async fn job_executions(&self, job: &ResourceId) -> Result<Vec<JsonValue>> {
        self.get_paged(&self.resource_url(job, "/executions")).await
    }

    async fn job_execution(&self, job: &ResourceId, name: &str) -> Result<JsonValue> {
        let suffix = format!("/executions/{}", urlencoding::encode(name));
        self.get_json(&self.resource_url(job, &suffix)).await
    }

    async fn access_token(&self) -> Result<String> {
        Ok(self.credential.get_token(MANAGEMENT_SCOPE).await?.token)
    }
}
