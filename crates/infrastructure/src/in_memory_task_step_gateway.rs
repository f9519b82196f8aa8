use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use fieldops_application::{
    ControlAction, GENERIC_FAILURE, SELECTED_OPTION_KEY, StepCompletionRequest, TaskStepGateway,
};
use fieldops_core::{AppError, AppResult};
use fieldops_domain::{TaskId, TaskStep, TaskStepStatus, WorkflowTask};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

/// In-memory task store applying completions the way the task API does.
#[derive(Debug)]
pub struct InMemoryTaskStepGateway {
    tasks: Mutex<HashMap<TaskId, WorkflowTask>>,
    completions: Mutex<Vec<StepCompletionRequest>>,
    applied_keys: Mutex<HashSet<String>>,
    performed_by: String,
}

impl InMemoryTaskStepGateway {
    /// Creates a store holding `tasks`, attributing completions to `performed_by`.
    #[must_use]
    pub fn new(
        tasks: impl IntoIterator<Item = WorkflowTask>,
        performed_by: impl Into<String>,
    ) -> Self {
        Self {
            tasks: Mutex::new(tasks.into_iter().map(|task| (task.id(), task)).collect()),
            completions: Mutex::new(Vec::new()),
            applied_keys: Mutex::new(HashSet::new()),
            performed_by: performed_by.into(),
        }
    }

    /// Returns every applied completion in order.
    pub async fn completions(&self) -> Vec<StepCompletionRequest> {
        self.completions.lock().await.clone()
    }
}

#[async_trait]
impl TaskStepGateway for InMemoryTaskStepGateway {
    async fn complete_step(&self, request: &StepCompletionRequest) -> AppResult<()> {
        let mut applied_keys = self.applied_keys.lock().await;
        if applied_keys.contains(&request.idempotency_key) {
            return Ok(());
        }

        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(&request.task_id)
            .ok_or_else(|| AppError::NotFound(format!("task {} does not exist", request.task_id)))?;

        let mut updated = task.clone();
        apply_completion(&mut updated, request, self.performed_by.as_str())?;
        updated.recompute_completion_percentage();
        info!(
            task_id = %request.task_id,
            step_id = %request.step_id,
            control_action = request.control_action.as_str(),
            completion_percentage = updated.completion_percentage(),
            "step completion applied"
        );
        *task = updated;

        applied_keys.insert(request.idempotency_key.clone());
        self.completions.lock().await.push(request.clone());
        Ok(())
    }

    async fn load_task(&self, task_id: TaskId) -> AppResult<WorkflowTask> {
        self.tasks
            .lock()
            .await
            .get(&task_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("task {task_id} does not exist")))
    }
}

fn apply_completion(
    task: &mut WorkflowTask,
    request: &StepCompletionRequest,
    performed_by: &str,
) -> AppResult<()> {
    let current = task.step(request.step_id).ok_or_else(|| {
        AppError::NotFound(format!(
            "step {} does not exist in task {}",
            request.step_id, request.task_id
        ))
    })?;
    if current.status().is_terminal() {
        return Err(AppError::Conflict(format!(
            "step {} is already {}",
            current.id(),
            current.status().as_str()
        )));
    }

    let current_order = current.step_order();
    let outcome = if request.field_values.get(SELECTED_OPTION_KEY)
        == Some(&Value::from(GENERIC_FAILURE))
    {
        TaskStepStatus::Failed
    } else {
        TaskStepStatus::Completed
    };

    match request.control_action {
        ControlAction::Advance => resolve(task, current_order, outcome, performed_by),
        ControlAction::Repeat => {
            reopen_range(task, current_order, current_order);
            Ok(())
        }
        ControlAction::Jump { step_order } => {
            if task.step_by_order(step_order).is_none() {
                return Err(AppError::Configuration(format!(
                    "step {} jumps to missing step order {step_order}",
                    request.step_id
                )));
            }

            if step_order <= current_order {
                reopen_range(task, step_order, current_order);
                return Ok(());
            }

            resolve(task, current_order, outcome, performed_by)?;
            for step in task.steps_mut().filter(|step| {
                step.step_order() > current_order
                    && step.step_order() < step_order
                    && !step.status().is_terminal()
            }) {
                finish(step, TaskStepStatus::Skipped, performed_by)?;
            }
            Ok(())
        }
    }
}

fn resolve(
    task: &mut WorkflowTask,
    step_order: i32,
    status: TaskStepStatus,
    performed_by: &str,
) -> AppResult<()> {
    match task
        .steps_mut()
        .find(|step| step.step_order() == step_order)
    {
        Some(step) => finish(step, status, performed_by),
        None => Ok(()),
    }
}

fn finish(step: &mut TaskStep, status: TaskStepStatus, performed_by: &str) -> AppResult<()> {
    let now = Utc::now();
    if step.status() == TaskStepStatus::Pending {
        step.transition_to(TaskStepStatus::InProgress, now, None)?;
    }
    step.transition_to(status, now, Some(performed_by))
}

fn reopen_range(task: &mut WorkflowTask, from_order: i32, to_order: i32) {
    for step in task
        .steps_mut()
        .filter(|step| (from_order..=to_order).contains(&step.step_order()))
    {
        step.reopen();
    }
}

#[cfg(test)]
mod tests {
    use fieldops_application::{ControlAction, StepCompletionRequest, TaskStepGateway};
    use fieldops_core::AppError;
    use fieldops_domain::{
        FieldValues, StepId, TaskId, TaskStep, TaskStepInput, TaskStepStatus, WorkflowTask,
        WorkflowTaskInput,
    };
    use serde_json::json;

    use super::InMemoryTaskStepGateway;

    fn task(statuses: &[TaskStepStatus]) -> WorkflowTask {
        let steps = statuses
            .iter()
            .zip(1_i32..)
            .map(|(status, order)| {
                let mut input =
                    TaskStepInput::pending(i64::from(order), format!("Step {order}"), order);
                input.status = *status;
                TaskStep::new(input).unwrap_or_else(|_| unreachable!())
            })
            .collect();

        WorkflowTask::new(WorkflowTaskInput {
            id: TaskId::new(1),
            template_id: None,
            steps,
            completion_percentage: 0.0,
        })
        .unwrap_or_else(|_| unreachable!())
    }

    fn request(step_id: i64, control_action: ControlAction, key: &str) -> StepCompletionRequest {
        StepCompletionRequest {
            task_id: TaskId::new(1),
            step_id: StepId::new(step_id),
            field_values: FieldValues::new(),
            control_action,
            idempotency_key: key.to_owned(),
        }
    }

    fn statuses(task: &WorkflowTask) -> Vec<TaskStepStatus> {
        task.steps().iter().map(TaskStep::status).collect()
    }

    async fn load(gateway: &InMemoryTaskStepGateway) -> WorkflowTask {
        gateway
            .load_task(TaskId::new(1))
            .await
            .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn advance_completes_the_step_and_updates_progress() {
        use TaskStepStatus::{Completed, Pending};
        let gateway = InMemoryTaskStepGateway::new([task(&[Pending, Pending])], "tech-7");

        let result = gateway
            .complete_step(&request(1, ControlAction::Advance, "k1"))
            .await;
        assert!(result.is_ok());

        let task = load(&gateway).await;
        assert_eq!(statuses(&task), vec![Completed, Pending]);
        assert_eq!(task.steps()[0].performed_by(), Some("tech-7"));
        assert!((task.completion_percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn generic_failure_marks_the_step_failed() {
        use TaskStepStatus::{Failed, Pending};
        let gateway = InMemoryTaskStepGateway::new([task(&[Pending])], "tech-7");
        let mut failure = request(1, ControlAction::Advance, "k1");
        failure
            .field_values
            .insert("selected_option".to_owned(), json!("failure"));

        assert!(gateway.complete_step(&failure).await.is_ok());
        assert_eq!(statuses(&load(&gateway).await), vec![Failed]);
    }

    #[tokio::test]
    async fn backward_jump_reopens_the_range() {
        use TaskStepStatus::{Completed, Pending};
        let gateway =
            InMemoryTaskStepGateway::new([task(&[Completed, Completed, Pending, Pending])], "t");

        let result = gateway
            .complete_step(&request(3, ControlAction::Jump { step_order: 2 }, "k1"))
            .await;
        assert!(result.is_ok());

        let task = load(&gateway).await;
        assert_eq!(statuses(&task), vec![Completed, Pending, Pending, Pending]);
        assert!(task.steps()[1].completed_at().is_none());
    }

    #[tokio::test]
    async fn forward_jump_skips_the_steps_in_between() {
        use TaskStepStatus::{Completed, Pending, Skipped};
        let gateway =
            InMemoryTaskStepGateway::new([task(&[Pending, Pending, Pending, Pending])], "t");

        let result = gateway
            .complete_step(&request(1, ControlAction::Jump { step_order: 4 }, "k1"))
            .await;
        assert!(result.is_ok());

        assert_eq!(
            statuses(&load(&gateway).await),
            vec![Completed, Skipped, Skipped, Pending]
        );
    }

    #[tokio::test]
    async fn repeated_key_is_applied_once() {
        use TaskStepStatus::{Completed, Pending};
        let gateway = InMemoryTaskStepGateway::new([task(&[Pending, Pending])], "t");
        let completion = request(1, ControlAction::Advance, "same");

        assert!(gateway.complete_step(&completion).await.is_ok());
        assert!(gateway.complete_step(&completion).await.is_ok());

        assert_eq!(gateway.completions().await.len(), 1);
        assert_eq!(statuses(&load(&gateway).await), vec![Completed, Pending]);
    }

    #[tokio::test]
    async fn completing_a_resolved_step_is_a_conflict() {
        use TaskStepStatus::{Completed, Pending};
        let gateway = InMemoryTaskStepGateway::new([task(&[Completed, Pending])], "t");

        let result = gateway
            .complete_step(&request(1, ControlAction::Advance, "k1"))
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(gateway.completions().await.is_empty());
    }
}
