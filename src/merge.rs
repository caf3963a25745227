//! Builds the execution template submitted when starting a job.
//!
//! Only the primary container (index 0) is touched. Environment lists are
//! concatenated without deduplication, so a name may appear twice; the
//! backend decides which entry takes effect.

use tracing::debug;

use crate::model::{AppContainer, EnvironmentVariable, ExecutionContainer, ExecutionTemplate, JobTemplate};

/// Merge optional start-time overrides into the job's stored template.
///
/// - `override_template` replaces the template wholesale; the stored primary
///   container's env entries are appended after its own.
/// - Otherwise a non-empty `command` and/or `env` produce a fresh primary
///   container with the stored image, name and resources. The command is
///   replaced, not appended. Env lists the stored entries first, then `env`.
///   Stored init containers are not carried into the fresh template.
/// - With nothing supplied the stored template, init containers included, is
///   returned as is.
pub fn merge(
    existing: &JobTemplate,
    override_template: Option<ExecutionTemplate>,
    command: Option<Vec<String>>,
    env: Option<Vec<EnvironmentVariable>>,
) -> ExecutionTemplate {
    let primary = existing.containers.first();

    if let Some(mut template) = override_template {
        if let (Some(target), Some(stored)) = (template.containers.first_mut(), primary) {
            debug!(appended = stored.env.len(), "extending override env with stored entries");
            target.env.extend(stored.env.iter().cloned());
        }
        return template;
    }

    let command = command.filter(|c| !c.is_empty());
    if command.is_none() && env.is_none() {
        return ExecutionTemplate::from(existing.clone());
    }

    let mut container = fresh_container(primary);
    if let Some(command) = command {
        debug!(args = command.len(), "replacing primary container command");
        container.command = command;
    }
    if let Some(env) = env {
        if let Some(stored) = primary {
            container.env.extend(stored.env.iter().cloned());
        }
        container.env.extend(env);
    }

    ExecutionTemplate {
        containers: vec![container],
        ..Default::default()
    }
}

fn fresh_container(primary: Option<&AppContainer>) -> ExecutionContainer {
    match primary {
        Some(stored) => ExecutionContainer {
            image: stored.image.clone(),
            name: stored.name.clone(),
            resources: stored.resources.clone(),
            ..Default::default()
        },
        None => ExecutionContainer::default(),
    }
}
