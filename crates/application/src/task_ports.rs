use async_trait::async_trait;
use fieldops_core::AppResult;
use fieldops_domain::{FieldValues, StepId, TaskId, WorkflowTask};

use crate::step_state_machine::ControlAction;

/// Completion request emitted for one resolved step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCompletionRequest {
    /// Owning task.
    pub task_id: TaskId,
    /// Resolved step.
    pub step_id: StepId,
    /// Values recorded with the completion.
    pub field_values: FieldValues,
    /// Control action the values encode, for adapters that apply it locally.
    pub control_action: ControlAction,
    /// Stable idempotency key reused when the same request is retried.
    pub idempotency_key: String,
}

/// Port to the external data layer that owns task steps.
#[async_trait]
pub trait TaskStepGateway: Send + Sync {
    /// Records the completion of one step.
    async fn complete_step(&self, request: &StepCompletionRequest) -> AppResult<()>;

    /// Loads the authoritative task with its current step list.
    async fn load_task(&self, task_id: TaskId) -> AppResult<WorkflowTask>;
}
