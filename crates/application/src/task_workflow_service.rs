use std::sync::Arc;

use fieldops_core::AppResult;
use fieldops_domain::TaskId;
use tracing::{info, warn};

use crate::task_ports::TaskStepGateway;
use crate::workflow_session::{StepTransition, WorkflowSession};

/// Drives workflow sessions against the task step gateway.
#[derive(Clone)]
pub struct TaskWorkflowService {
    gateway: Arc<dyn TaskStepGateway>,
}

impl TaskWorkflowService {
    /// Creates a workflow service.
    #[must_use]
    pub fn new(gateway: Arc<dyn TaskStepGateway>) -> Self {
        Self { gateway }
    }

    /// Loads a task and opens a session on it.
    pub async fn open_session(&self, task_id: TaskId) -> AppResult<WorkflowSession> {
        let task = self.gateway.load_task(task_id).await?;

        for invalid in task.invalid_jump_targets() {
            warn!(task_id = %task_id, "{invalid}");
        }

        Ok(WorkflowSession::new(task))
    }

    /// Resolves the active step, records its completion and applies the
    /// refreshed step list.
    ///
    /// Validation and configuration errors are returned before any call is
    /// made. When the completion call fails the session keeps its step list
    /// and inputs. When the completion succeeds but the reload fails, the
    /// session stays pending until [`Self::refresh`] succeeds.
    pub async fn submit_active_step(
        &self,
        session: &mut WorkflowSession,
    ) -> AppResult<StepTransition> {
        let request = session.prepare_completion()?;

        if let Err(error) = self.gateway.complete_step(&request).await {
            session.reject_completion(error.clone())?;
            return Err(error);
        }

        let refreshed = match self.gateway.load_task(request.task_id).await {
            Ok(refreshed) => refreshed,
            Err(error) => {
                warn!(
                    task_id = %request.task_id,
                    step_id = %request.step_id,
                    error = %error,
                    "step completion recorded but reloading the task failed"
                );
                return Err(error);
            }
        };

        session.confirm_completion(refreshed)
    }

    /// Reloads the task. Confirms a completion still awaiting its reload.
    pub async fn refresh(
        &self,
        session: &mut WorkflowSession,
    ) -> AppResult<Option<StepTransition>> {
        let refreshed = self.gateway.load_task(session.task().id()).await?;

        if session.is_pending_confirmation() {
            return session.confirm_completion(refreshed).map(Some);
        }

        session.replace_task(refreshed)?;
        info!(task_id = %session.task().id(), "task refreshed");
        Ok(None)
    }
}
