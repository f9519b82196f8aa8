use super::*;

impl WorkflowSession {
    /// Resolves the active step and marks the completion as pending.
    ///
    /// Retrying after a failure with unchanged inputs reuses the failed
    /// request, idempotency key included.
    pub fn prepare_completion(&mut self) -> AppResult<StepCompletionRequest> {
        self.ensure_not_pending()?;

        let step = self.active_step().ok_or_else(|| {
            AppError::Conflict(format!("task {} has no active step", self.task.id()))
        })?;
        let resolved = resolve_outcome(&self.task, step, &self.inputs)?;

        let request = match &self.confirmation {
            ConfirmationState::Failed { request, .. }
                if request.step_id == resolved.step_id
                    && request.field_values == resolved.field_values
                    && request.control_action == resolved.control_action =>
            {
                request.clone()
            }
            _ => StepCompletionRequest {
                task_id: self.task.id(),
                step_id: resolved.step_id,
                field_values: resolved.field_values,
                control_action: resolved.control_action,
                idempotency_key: Uuid::new_v4().to_string(),
            },
        };

        self.confirmation = ConfirmationState::PendingConfirmation(request.clone());
        Ok(request)
    }

    /// Applies the refreshed step list after the data layer confirmed the completion.
    ///
    /// Inputs are always reset, also when the same step becomes active again.
    pub fn confirm_completion(&mut self, refreshed: WorkflowTask) -> AppResult<StepTransition> {
        let ConfirmationState::PendingConfirmation(request) = &self.confirmation else {
            return Err(AppError::Conflict(format!(
                "no step completion for task {} awaits confirmation",
                self.task.id()
            )));
        };
        self.ensure_same_task(&refreshed)?;

        let resolved_step = request.step_id;
        info!(
            task_id = %self.task.id(),
            step_id = %resolved_step,
            control_action = request.control_action.as_str(),
            "step completion confirmed"
        );

        self.task = refreshed;
        self.confirmation = ConfirmationState::Idle;
        let active_step = self.active_step().map(TaskStep::id);
        self.inputs = StepInputs::for_step(active_step);
        self.report_progress();

        Ok(StepTransition {
            resolved_step,
            active_step,
            progress: self.progress(),
        })
    }

    /// Records a failed completion. The step list and inputs stay as they were.
    pub fn reject_completion(&mut self, error: AppError) -> AppResult<()> {
        let ConfirmationState::PendingConfirmation(request) = &self.confirmation else {
            return Err(AppError::Conflict(format!(
                "no step completion for task {} awaits confirmation",
                self.task.id()
            )));
        };

        warn!(
            task_id = %self.task.id(),
            step_id = %request.step_id,
            error = %error,
            "step completion failed"
        );

        self.confirmation = ConfirmationState::Failed {
            request: request.clone(),
            error,
        };
        Ok(())
    }
}
