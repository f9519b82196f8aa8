use fieldops_core::{AppError, AppResult};
use fieldops_domain::{StepId, TaskStep, TaskStepStatus, WorkflowTask};

/// What happens after a step resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Continue with the next step in order.
    Advance,
    /// Run the same step again.
    Repeat,
    /// Continue at the step with this order.
    Jump {
        /// Target `step_order`.
        step_order: i32,
    },
}

impl ControlAction {
    /// Returns stable label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Repeat => "repeat",
            Self::Jump { .. } => "jump",
        }
    }
}

/// Overall position of a task's workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowProgress {
    /// One step is in focus.
    Active(StepId),
    /// Every step is completed, failed, or skipped.
    Complete,
    /// No step is pending or in progress yet some step is not terminal.
    Stalled,
}

/// User-facing action on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Move pending to in progress.
    Start,
    /// Resolve with an outcome.
    Complete,
    /// Resolve unsuccessfully.
    Fail,
    /// Bypass the step.
    Skip,
}

/// Derived view over a task's steps. Never mutates the task.
#[derive(Debug, Clone, Copy)]
pub struct StepStateMachine<'a> {
    steps: &'a [TaskStep],
}

impl<'a> StepStateMachine<'a> {
    /// Creates a view over steps already sorted by `step_order`.
    #[must_use]
    pub fn new(task: &'a WorkflowTask) -> Self {
        Self {
            steps: task.steps(),
        }
    }

    /// Returns the first pending step, else the first in-progress step.
    #[must_use]
    pub fn active_step(&self) -> Option<&'a TaskStep> {
        self.first_with_status(TaskStepStatus::Pending)
            .or_else(|| self.first_with_status(TaskStepStatus::InProgress))
    }

    /// Returns the overall workflow position.
    #[must_use]
    pub fn progress(&self) -> WorkflowProgress {
        if let Some(step) = self.active_step() {
            return WorkflowProgress::Active(step.id());
        }

        if self.steps.iter().all(|step| step.status().is_terminal()) {
            WorkflowProgress::Complete
        } else {
            WorkflowProgress::Stalled
        }
    }

    /// Returns the step immediately after `step_id` in order.
    #[must_use]
    pub fn next_step_after(&self, step_id: StepId) -> Option<&'a TaskStep> {
        let position = self.steps.iter().position(|step| step.id() == step_id)?;
        self.steps.get(position + 1)
    }

    /// Returns the natural successor of the active step, for "Next: ..." previews.
    #[must_use]
    pub fn next_step_preview(&self) -> Option<&'a TaskStep> {
        self.active_step()
            .and_then(|step| self.next_step_after(step.id()))
    }

    /// Returns the actions a user may take on a step in its current status.
    #[must_use]
    pub fn allowed_actions(step: &TaskStep) -> &'static [StepAction] {
        match step.status() {
            TaskStepStatus::Pending => &[StepAction::Start, StepAction::Complete],
            TaskStepStatus::InProgress => {
                &[StepAction::Complete, StepAction::Fail, StepAction::Skip]
            }
            TaskStepStatus::Completed
            | TaskStepStatus::Failed
            | TaskStepStatus::Skipped
            | TaskStepStatus::Unrecognized => &[],
        }
    }

    /// Returns the step that runs after `step` resolves with `action`.
    /// `None` means the workflow ends.
    pub fn target_for(
        &self,
        step: &TaskStep,
        action: ControlAction,
    ) -> AppResult<Option<&'a TaskStep>> {
        match action {
            ControlAction::Advance => Ok(self.next_step_after(step.id())),
            ControlAction::Repeat => self
                .steps
                .iter()
                .find(|candidate| candidate.id() == step.id())
                .map(Some)
                .ok_or_else(|| {
                    AppError::NotFound(format!("step {} is not part of this task", step.id()))
                }),
            ControlAction::Jump { step_order } => self
                .steps
                .iter()
                .find(|candidate| candidate.step_order() == step_order)
                .map(Some)
                .ok_or_else(|| {
                    AppError::Configuration(format!(
                        "step '{}' jumps to step order {step_order}, which does not exist",
                        step.name()
                    ))
                }),
        }
    }

    fn first_with_status(&self, status: TaskStepStatus) -> Option<&'a TaskStep> {
        self.steps.iter().find(|step| step.status() == status)
    }
}

#[cfg(test)]
mod tests {
    use fieldops_domain::{
        StepId, TaskId, TaskStep, TaskStepInput, TaskStepStatus, WorkflowTask, WorkflowTaskInput,
    };

    use super::{ControlAction, StepAction, StepStateMachine, WorkflowProgress};

    fn task(statuses: &[(i32, TaskStepStatus)]) -> WorkflowTask {
        let steps = statuses
            .iter()
            .map(|(order, status)| {
                let mut input =
                    TaskStepInput::pending(i64::from(*order) * 10, format!("Step {order}"), *order);
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

    #[test]
    fn pending_wins_over_in_progress() {
        let task = task(&[
            (1, TaskStepStatus::Completed),
            (2, TaskStepStatus::InProgress),
            (3, TaskStepStatus::Pending),
        ]);
        let machine = StepStateMachine::new(&task);

        assert_eq!(machine.active_step().map(TaskStep::id), Some(StepId::new(30)));
    }

    #[test]
    fn in_progress_is_active_when_nothing_is_pending() {
        let task = task(&[
            (1, TaskStepStatus::Completed),
            (2, TaskStepStatus::InProgress),
            (3, TaskStepStatus::Skipped),
        ]);
        let machine = StepStateMachine::new(&task);

        assert_eq!(machine.progress(), WorkflowProgress::Active(StepId::new(20)));
        assert_eq!(machine.next_step_preview().map(TaskStep::id), Some(StepId::new(30)));
    }

    #[test]
    fn progress_distinguishes_complete_from_empty_and_terminal() {
        let done = task(&[(1, TaskStepStatus::Completed), (2, TaskStepStatus::Failed)]);
        assert_eq!(StepStateMachine::new(&done).progress(), WorkflowProgress::Complete);

        let empty = task(&[]);
        assert_eq!(StepStateMachine::new(&empty).progress(), WorkflowProgress::Complete);
        assert!(StepStateMachine::new(&empty).next_step_preview().is_none());
    }

    #[test]
    fn unresolved_steps_without_active_candidate_stall() {
        let task = task(&[
            (1, TaskStepStatus::Completed),
            (2, TaskStepStatus::Unrecognized),
        ]);

        assert_eq!(StepStateMachine::new(&task).progress(), WorkflowProgress::Stalled);
    }

    #[test]
    fn preview_is_natural_successor_by_order() {
        let task = task(&[
            (5, TaskStepStatus::Pending),
            (1, TaskStepStatus::Pending),
            (3, TaskStepStatus::Pending),
        ]);
        let machine = StepStateMachine::new(&task);

        assert_eq!(machine.active_step().map(TaskStep::step_order), Some(1));
        assert_eq!(machine.next_step_preview().map(TaskStep::step_order), Some(3));
    }

    #[test]
    fn allowed_actions_follow_status() {
        let task = task(&[
            (1, TaskStepStatus::Pending),
            (2, TaskStepStatus::InProgress),
            (3, TaskStepStatus::Completed),
        ]);

        assert_eq!(
            StepStateMachine::allowed_actions(&task.steps()[0]),
            &[StepAction::Start, StepAction::Complete]
        );
        assert!(StepStateMachine::allowed_actions(&task.steps()[1]).contains(&StepAction::Skip));
        assert!(StepStateMachine::allowed_actions(&task.steps()[2]).is_empty());
    }

    #[test]
    fn targets_follow_control_action() {
        let task = task(&[
            (1, TaskStepStatus::Completed),
            (2, TaskStepStatus::Pending),
            (3, TaskStepStatus::Pending),
        ]);
        let machine = StepStateMachine::new(&task);
        let current = &task.steps()[1];

        let advance = machine.target_for(current, ControlAction::Advance);
        assert_eq!(advance.ok().flatten().map(TaskStep::step_order), Some(3));

        let repeat = machine.target_for(current, ControlAction::Repeat);
        assert_eq!(repeat.ok().flatten().map(TaskStep::id), Some(current.id()));

        let jump = machine.target_for(current, ControlAction::Jump { step_order: 1 });
        assert_eq!(jump.ok().flatten().map(TaskStep::step_order), Some(1));

        let last = &task.steps()[2];
        assert!(matches!(machine.target_for(last, ControlAction::Advance), Ok(None)));
    }

    #[test]
    fn jump_to_missing_order_is_a_configuration_error() {
        let task = task(&[(1, TaskStepStatus::Pending), (2, TaskStepStatus::Pending)]);
        let machine = StepStateMachine::new(&task);

        let result = machine.target_for(&task.steps()[0], ControlAction::Jump { step_order: 7 });
        assert!(matches!(result, Err(fieldops_core::AppError::Configuration(_))));
    }
}
