//! Fieldops interactive task step runner.

#![forbid(unsafe_code)]

mod config;
mod console;

use std::sync::Arc;
use std::time::Duration;

use fieldops_application::{TaskStepGateway, TaskWorkflowService, WorkflowSession};
use fieldops_core::{AppError, AppResult};
use fieldops_domain::{TaskId, WorkflowTask};
use fieldops_infrastructure::{HttpTaskStepGateway, InMemoryTaskStepGateway};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{RunnerConfig, TaskSource};
use crate::console::{Command, HELP, render};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RunnerConfig::load()?;
    let (gateway, task_id) = build_gateway(&config)?;
    let service = TaskWorkflowService::new(gateway);
    let mut session = service.open_session(task_id).await?;

    info!(task_id = %task_id, "fieldops-runner started");
    println!("{HELP}");
    print!("{}", render(&session));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|error| AppError::Internal(format!("failed to read stdin: {error}")))?
    {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        if let Err(error) = run_command(&service, &mut session, command).await {
            if error.is_retryable() {
                warn!(task_id = %task_id, error = %error, "task API call failed");
            }
            println!("{error}");
        }
        print!("{}", render(&session));
    }

    info!(task_id = %task_id, "fieldops-runner stopped");
    Ok(())
}

async fn run_command(
    service: &TaskWorkflowService,
    session: &mut WorkflowSession,
    command: Command,
) -> AppResult<()> {
    match command {
        Command::Show | Command::Quit => Ok(()),
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Select(value) => session.select_outcome(value),
        Command::Text(value) => session.set_text_value(value),
        Command::Number(value) => session.set_number_value(value),
        Command::Check(value) => session.set_checkbox_value(value),
        Command::Submit => {
            let transition = service.submit_active_step(session).await?;
            info!(
                task_id = %session.task().id(),
                step_id = %transition.resolved_step,
                "step submitted"
            );
            Ok(())
        }
        Command::Refresh => service.refresh(session).await.map(|_| ()),
    }
}

fn build_gateway(config: &RunnerConfig) -> AppResult<(Arc<dyn TaskStepGateway>, TaskId)> {
    match &config.source {
        TaskSource::Api {
            base_url,
            api_token,
        } => {
            let task_id = config.task_id.ok_or_else(|| {
                AppError::Configuration("FIELDOPS_TASK_ID is required".to_owned())
            })?;
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_seconds))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;

            let mut gateway = HttpTaskStepGateway::new(
                http_client,
                base_url.as_str(),
                config.http_max_attempts,
                config.http_retry_backoff_ms,
            );
            if let Some(api_token) = api_token {
                gateway = gateway.with_api_token(api_token.as_str());
            }

            let gateway: Arc<dyn TaskStepGateway> = Arc::new(gateway);
            Ok((gateway, task_id))
        }
        TaskSource::File { path, performed_by } => {
            let contents = std::fs::read_to_string(path).map_err(|error| {
                AppError::Configuration(format!(
                    "failed to read task file '{}': {error}",
                    path.display()
                ))
            })?;
            let tasks = parse_tasks(contents.as_str())?;
            let task_id = match config.task_id {
                Some(task_id) => task_id,
                None => tasks.first().map(WorkflowTask::id).ok_or_else(|| {
                    AppError::Configuration(format!(
                        "task file '{}' holds no tasks",
                        path.display()
                    ))
                })?,
            };

            let gateway: Arc<dyn TaskStepGateway> =
                Arc::new(InMemoryTaskStepGateway::new(tasks, performed_by.as_str()));
            Ok((gateway, task_id))
        }
    }
}

fn parse_tasks(contents: &str) -> AppResult<Vec<WorkflowTask>> {
    let document = serde_json::from_str::<Value>(contents)
        .map_err(|error| AppError::Configuration(format!("task file is not JSON: {error}")))?;

    let result = match document {
        Value::Array(_) => serde_json::from_value::<Vec<WorkflowTask>>(document),
        other => serde_json::from_value::<WorkflowTask>(other).map(|task| vec![task]),
    };

    result.map_err(|error| AppError::Configuration(format!("invalid task in task file: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
