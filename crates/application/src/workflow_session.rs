use fieldops_core::{AppError, AppResult};
use fieldops_domain::{StepId, TaskStep, WorkflowTask};
use tracing::{info, warn};
use uuid::Uuid;

use crate::outcome_resolver::{OutcomeChoice, outcome_choices, resolve_outcome};
use crate::step_inputs::StepInputs;
use crate::step_state_machine::{StepStateMachine, WorkflowProgress};
use crate::task_ports::StepCompletionRequest;

mod completion;

/// Whether a completion request is in flight for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationState {
    /// Nothing in flight.
    Idle,
    /// A completion was issued and its result is not known yet.
    PendingConfirmation(StepCompletionRequest),
    /// The last completion failed; inputs are kept for a retry.
    Failed {
        /// Request that failed.
        request: StepCompletionRequest,
        /// Failure reported by the data layer.
        error: AppError,
    },
}

/// Active step change produced by a confirmed completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTransition {
    /// Step that was resolved.
    pub resolved_step: StepId,
    /// Active step after the refreshed step list was applied.
    pub active_step: Option<StepId>,
    /// Workflow position after the refreshed step list was applied.
    pub progress: WorkflowProgress,
}

/// Per-task owner of the step list, transient inputs and confirmation state.
///
/// The step list is never patched locally. It is replaced wholesale by the
/// refreshed list the data layer returns after a confirmed completion.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    task: WorkflowTask,
    inputs: StepInputs,
    confirmation: ConfirmationState,
}

impl WorkflowSession {
    /// Opens a session on a loaded task.
    #[must_use]
    pub fn new(task: WorkflowTask) -> Self {
        let active_step = StepStateMachine::new(&task).active_step().map(TaskStep::id);
        let session = Self {
            task,
            inputs: StepInputs::for_step(active_step),
            confirmation: ConfirmationState::Idle,
        };
        session.report_progress();
        session
    }

    /// Returns the current authoritative task.
    #[must_use]
    pub fn task(&self) -> &WorkflowTask {
        &self.task
    }

    /// Returns the collected inputs.
    #[must_use]
    pub fn inputs(&self) -> &StepInputs {
        &self.inputs
    }

    /// Returns the confirmation state.
    #[must_use]
    pub fn confirmation(&self) -> &ConfirmationState {
        &self.confirmation
    }

    /// Returns whether a completion awaits confirmation.
    #[must_use]
    pub fn is_pending_confirmation(&self) -> bool {
        matches!(self.confirmation, ConfirmationState::PendingConfirmation(_))
    }

    /// Returns the active step. Provisional while a completion is pending.
    #[must_use]
    pub fn active_step(&self) -> Option<&TaskStep> {
        self.state_machine().active_step()
    }

    /// Returns the overall workflow position.
    #[must_use]
    pub fn progress(&self) -> WorkflowProgress {
        self.state_machine().progress()
    }

    /// Returns the natural successor of the active step.
    #[must_use]
    pub fn next_step_preview(&self) -> Option<&TaskStep> {
        self.state_machine().next_step_preview()
    }

    /// Returns the outcomes selectable on the active step.
    #[must_use]
    pub fn outcome_choices(&self) -> Vec<OutcomeChoice> {
        self.active_step().map(outcome_choices).unwrap_or_default()
    }

    /// Records the selected outcome for the active step.
    pub fn select_outcome(&mut self, value: impl Into<String>) -> AppResult<()> {
        self.editable_inputs()?.select_outcome(value);
        Ok(())
    }

    /// Records free text for the active step.
    pub fn set_text_value(&mut self, value: impl Into<String>) -> AppResult<()> {
        self.editable_inputs()?.set_text_value(value);
        Ok(())
    }

    /// Records a raw numeric input for the active step.
    pub fn set_number_value(&mut self, value: impl Into<String>) -> AppResult<()> {
        self.editable_inputs()?.set_number_value(value);
        Ok(())
    }

    /// Records the checkbox state for the active step.
    pub fn set_checkbox_value(&mut self, value: bool) -> AppResult<()> {
        self.editable_inputs()?.set_checkbox_value(value);
        Ok(())
    }

    /// Clears the collected inputs.
    pub fn clear_inputs(&mut self) -> AppResult<()> {
        self.editable_inputs()?.reset();
        Ok(())
    }

    /// Replaces the step list with a fresh copy from the data layer.
    ///
    /// Inputs survive only when the active step is unchanged.
    pub fn replace_task(&mut self, refreshed: WorkflowTask) -> AppResult<()> {
        self.ensure_not_pending()?;
        self.ensure_same_task(&refreshed)?;

        self.task = refreshed;
        let active_step = self.active_step().map(TaskStep::id);
        if self.inputs.scope_to(active_step) {
            self.confirmation = ConfirmationState::Idle;
        }
        self.report_progress();
        Ok(())
    }

    fn state_machine(&self) -> StepStateMachine<'_> {
        StepStateMachine::new(&self.task)
    }

    fn editable_inputs(&mut self) -> AppResult<&mut StepInputs> {
        self.ensure_not_pending()?;
        if self.active_step().is_none() {
            return Err(AppError::Conflict(format!(
                "task {} has no active step",
                self.task.id()
            )));
        }
        Ok(&mut self.inputs)
    }

    fn ensure_not_pending(&self) -> AppResult<()> {
        if self.is_pending_confirmation() {
            return Err(AppError::Conflict(format!(
                "a step completion for task {} is awaiting confirmation",
                self.task.id()
            )));
        }
        Ok(())
    }

    fn ensure_same_task(&self, refreshed: &WorkflowTask) -> AppResult<()> {
        if refreshed.id() != self.task.id() {
            return Err(AppError::Validation(format!(
                "refreshed task {} does not match session task {}",
                refreshed.id(),
                self.task.id()
            )));
        }
        Ok(())
    }

    fn report_progress(&self) {
        match self.progress() {
            WorkflowProgress::Active(step_id) => {
                info!(task_id = %self.task.id(), step_id = %step_id, "active step selected");
            }
            WorkflowProgress::Complete => {
                info!(task_id = %self.task.id(), "workflow complete");
            }
            WorkflowProgress::Stalled => {
                warn!(
                    task_id = %self.task.id(),
                    "workflow stalled: no pending or in-progress step but the task is unresolved"
                );
            }
        }
    }
}
