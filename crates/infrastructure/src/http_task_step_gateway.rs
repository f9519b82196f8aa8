use std::time::Duration;

use async_trait::async_trait;
use fieldops_application::{StepCompletionRequest, TaskStepGateway};
use fieldops_core::{AppError, AppResult};
use fieldops_domain::{TaskId, WorkflowTask};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

/// HTTP adapter for the task step API.
pub struct HttpTaskStepGateway {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpTaskStepGateway {
    /// Creates a gateway for the API rooted at `base_url`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_token: None,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }

    /// Sends a bearer token with every request.
    #[must_use]
    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    fn task_url(&self, task_id: TaskId) -> String {
        format!("{}/api/tasks/{task_id}", self.base_url)
    }

    fn complete_step_url(&self, request: &StepCompletionRequest) -> String {
        format!(
            "{}/steps/{}/complete",
            self.task_url(request.task_id),
            request.step_id
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(api_token) => builder.bearer_auth(api_token),
            None => builder,
        }
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut build: F,
    ) -> AppResult<reqwest::Response>
    where
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self.authorize(build(&self.http_client)).send().await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} for {operation}",
                        response.status()
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(status_error(status, operation, &body));
                }
                Err(error) => {
                    last_error = Some(format!("{operation} transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying {operation}"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Upstream(last_error.unwrap_or_else(|| {
            format!("{operation} exhausted retries")
        })))
    }
}

fn status_error(status: StatusCode, operation: &str, body: &str) -> AppError {
    let message = format!("{operation} failed with status {status}: {body}");
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Configuration(message),
        _ => AppError::Upstream(message),
    }
}

#[async_trait]
impl TaskStepGateway for HttpTaskStepGateway {
    async fn complete_step(&self, request: &StepCompletionRequest) -> AppResult<()> {
        let url = self.complete_step_url(request);
        let body = json!({ "field_values": request.field_values });
        debug!(
            task_id = %request.task_id,
            step_id = %request.step_id,
            idempotency_key = %request.idempotency_key,
            "posting step completion"
        );

        self.send_with_retry("step completion", |client| {
            client
                .post(url.as_str())
                .header("Idempotency-Key", request.idempotency_key.as_str())
                .json(&body)
        })
        .await?;

        Ok(())
    }

    async fn load_task(&self, task_id: TaskId) -> AppResult<WorkflowTask> {
        let url = self.task_url(task_id);
        let response = self
            .send_with_retry("task load", |client| client.get(url.as_str()))
            .await?;

        response.json::<WorkflowTask>().await.map_err(|error| {
            AppError::Upstream(format!("task {task_id} payload could not be read: {error}"))
        })
    }
}

#[cfg(test)]
mod tests;
