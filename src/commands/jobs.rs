use serde_json::Value as JsonValue;
use tracing::{info, warn};

use super::in_context;
use crate::arm::ExecutionDetailsFetcher;
use crate::error::{AzError, Result};
use crate::locator::{ResourceKind, ResourceLocator};
use crate::lro::{LroExecutor, Operation};
use crate::merge::merge;
use crate::model::{ExecutionTemplate, JobTemplate};
use crate::resolver::Resolver;
use crate::session::Session;
use crate::template::{app_env, EnvVarInput};

/// Start-time overrides for one job execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartOverrides {
    pub template: Option<ExecutionTemplate>,
    pub command: Option<Vec<String>>,
    pub env: Option<Vec<EnvVarInput>>,
}

/// Start one execution of a job and return the execution reference.
pub async fn start_job(
    session: &Session,
    job: &ResourceLocator,
    overrides: StartOverrides,
) -> Result<Option<JsonValue>> {
    in_context("start-job", job.label(), async {
        let client = session.require_client().await?;
        let id = Resolver::new(client.as_ref())
            .target(ResourceKind::ContainerAppJob, job)
            .await?;

        let state = client.get(&id).await?;
        let stored: JobTemplate = match state.pointer("/properties/template") {
            Some(template) => serde_json::from_value(template.clone())?,
            None => JobTemplate::default(),
        };

        let template = merge(
            &stored,
            overrides.template,
            overrides.command,
            overrides.env.as_deref().map(app_env),
        );

        info!(id = %id, containers = template.containers.len(), "starting job execution");
        LroExecutor::new(client.as_ref(), session.poll_config().clone())
            .submit(Operation::Start {
                target: id,
                template: serde_json::to_value(&template)?,
            })
            .await
    })
    .await
}

/// Execution detail documents, plus the fetches that failed.
#[derive(Debug, Default)]
pub struct ExecutionDetails {
    /// Pretty-printed JSON, in execution listing order.
    pub details: Vec<String>,
    pub failed: Vec<AzError>,
}

/// Details of one named execution, or of every execution of the job.
///
/// A failed detail fetch is recorded in `failed` and the rest continue.
pub async fn get_job_executions(
    session: &Session,
    job: &ResourceLocator,
    execution_name: Option<&str>,
) -> Result<ExecutionDetails> {
    in_context("get-job-execution", job.label(), async {
        let client = session.require_client().await?;
        let id = Resolver::new(client.as_ref())
            .target(ResourceKind::ContainerAppJob, job)
            .await?;

        let executions = match execution_name.filter(|n| !n.is_empty()) {
            Some(name) => vec![client.job_execution(&id, name).await?],
            None => client.job_executions(&id).await?,
        };

        let token = client.access_token().await?;
        let fetcher = ExecutionDetailsFetcher::new(client.endpoint());
        let mut result = ExecutionDetails::default();

        for execution in executions {
            let Some(execution_id) = execution.get("id").and_then(|v| v.as_str()) else {
                result
                    .failed
                    .push(AzError::unexpected("job execution has no id"));
                continue;
            };

            match fetcher.fetch(execution_id, &token).await {
                Ok(details) => result.details.push(details),
                Err(e) => {
                    warn!(execution = execution_id, error = %e, "execution detail fetch failed");
                    result.failed.push(e.in_operation("get-job-execution", execution_id));
                }
            }
        }

        info!(
            job = %id,
            fetched = result.details.len(),
            failed = result.failed.len(),
            "collected job executions"
        );
        Ok(result)
    })
    .await
}
