//! One async function per front-end operation.
//!
//! Every operation takes the [`Session`] explicitly, resolves its target,
//! builds a document where needed and waits for the terminal state. Errors
//! carry the operation name and target label.

mod jobs;
mod resources;

pub use jobs::{get_job_executions, start_job, ExecutionDetails, StartOverrides};
pub use resources::{
    create_app, create_app_job, create_container_group, get_app_jobs, get_apps,
    get_container_groups, get_environment, remove_app, remove_app_job, remove_container_group,
    CreateTarget,
};

use std::future::Future;
use tracing::info;

use crate::error::Result;
use crate::session::Session;

/// Populate (or with `force`, replace) the session's management client.
pub async fn connect(session: &Session, force: bool) -> Result<()> {
    let client = session
        .connect(force)
        .await
        .map_err(|e| e.in_operation("connect", "management endpoint"))?;
    info!(endpoint = client.endpoint(), "management client ready");
    Ok(())
}

/// Attach operation context to any failure of `work`.
async fn in_context<T>(
    operation: &'static str,
    target: String,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    work.await.map_err(|e| e.in_operation(operation, target))
}
