use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{AzError, Result};

pub const EXECUTION_DETAILS_API_VERSION: &str = "2023-04-01-preview";

/// Fetches a job execution's full document straight from the management
/// endpoint, outside the management client.
pub struct ExecutionDetailsFetcher {
    http: Client,
    endpoint: String,
    api_version: String,
}

impl ExecutionDetailsFetcher {
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(http: Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: EXECUTION_DETAILS_API_VERSION.to_string(),
        }
    }

    pub fn url(&self, execution_id: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.endpoint, execution_id, self.api_version
        )
    }

    /// Pretty-printed JSON for one execution.
    pub async fn fetch(&self, execution_id: &str, token: &str) -> Result<String> {
        let url = self.url(execution_id);
        debug!(url = %url, "fetching execution details");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AzError::ExternalCallFailed {
                url: url.clone(),
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AzError::ExternalCallFailed {
            url: url.clone(),
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AzError::ExternalCallFailed {
                url,
                status: Some(status.as_u16()),
                message: text.trim().to_string(),
            });
        }

        let document: JsonValue = serde_json::from_str(&text)?;
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_appends_execution_id_and_api_version() {
        let fetcher = ExecutionDetailsFetcher::new("https://management.azure.com/");
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.App/jobs/j/executions/j-1";
        assert_eq!(
            fetcher.url(id),
            format!(
                "https://management.azure.com{}?api-version=2023-04-01-preview",
                id
            )
        );
    }
}
