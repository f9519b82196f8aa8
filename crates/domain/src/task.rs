use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use fieldops_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Deserializer, Serialize};

/// Legacy step name that always requires an answered/did-not-answer outcome.
pub const CALL_OUTCOME_STEP_NAME: &str = "Call Homeowner";

/// Identifier of a workflow task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Creates a task identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of a step instance inside a running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(i64);

impl StepId {
    /// Creates a step identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for StepId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Execution status of one task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStepStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Started but not resolved.
    InProgress,
    /// Resolved successfully.
    Completed,
    /// Resolved unsuccessfully.
    Failed,
    /// Bypassed without being performed.
    Skipped,
    /// Status reported by the data layer that this client does not know.
    #[serde(other)]
    Unrecognized,
}

impl TaskStepStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Returns whether no further forward transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Returns whether a forward transition to `next` is allowed.
    ///
    /// Resetting a step to pending is not a forward transition; see
    /// [`TaskStep::reopen`].
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (
                    Self::InProgress,
                    Self::Completed | Self::Failed | Self::Skipped
                )
        )
    }
}

/// Kind of value recorded when a step succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessRecordType {
    /// Nothing beyond the outcome is recorded.
    #[default]
    None,
    /// Boolean confirmation.
    Checkbox,
    /// One choice from a list.
    Dropdown,
    /// Free text.
    Text,
    /// Numeric reading.
    Number,
}

impl SuccessRecordType {
    /// Returns whether the record type captures a freeform input.
    #[must_use]
    pub fn is_freeform(&self) -> bool {
        matches!(self, Self::Checkbox | Self::Text | Self::Number)
    }
}

/// Control action attached to an authored success option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessAction {
    /// Continue with the next step in order.
    Next,
    /// Run the same step again.
    Repeat,
    /// Continue at the step whose order equals `next_step`.
    Jump,
}

impl SuccessAction {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Repeat => "repeat",
            Self::Jump => "jump",
        }
    }
}

/// Input payload used to construct a success option.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuccessOptionInput {
    /// Option identifier, sent as the selected value.
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Control action taken when the option is selected.
    pub action: SuccessAction,
    /// Target step order for jumps.
    #[serde(default)]
    pub next_step: Option<i32>,
}

/// Authored, named outcome of a conditional step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SuccessOptionInput")]
pub struct SuccessOption {
    id: String,
    label: String,
    action: SuccessAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_step: Option<i32>,
}

impl SuccessOption {
    /// Creates a validated success option.
    ///
    /// A jump without `next_step` is kept so the task still loads; it is
    /// listed by [`WorkflowTask::invalid_jump_targets`] and refused when
    /// selected.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        action: SuccessAction,
        next_step: Option<i32>,
    ) -> AppResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AppError::Validation(
                "success option id must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            id,
            label: label.into(),
            action,
            next_step: (action == SuccessAction::Jump).then_some(next_step).flatten(),
        })
    }

    /// Returns option identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns display label, falling back to the id.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.label.trim().is_empty() {
            self.id.as_str()
        } else {
            self.label.as_str()
        }
    }

    /// Returns control action.
    #[must_use]
    pub fn action(&self) -> SuccessAction {
        self.action
    }

    /// Returns whether the option jumps but names no target.
    #[must_use]
    pub fn is_untargeted_jump(&self) -> bool {
        self.action == SuccessAction::Jump && self.next_step.is_none()
    }

    /// Returns jump target order when the action is a jump.
    #[must_use]
    pub fn next_step(&self) -> Option<i32> {
        match self.action {
            SuccessAction::Jump => self.next_step,
            SuccessAction::Next | SuccessAction::Repeat => None,
        }
    }
}

impl TryFrom<SuccessOptionInput> for SuccessOption {
    type Error = AppError;

    fn try_from(value: SuccessOptionInput) -> Result<Self, Self::Error> {
        Self::new(value.id, value.label, value.action, value.next_step)
    }
}

/// Input payload used to construct a task step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStepInput {
    /// Step instance identifier.
    pub id: StepId,
    /// Authored template step, kept for audit only.
    #[serde(default)]
    pub template_step_id: Option<i64>,
    /// Step display name.
    pub name: String,
    /// Current status.
    #[serde(default)]
    pub status: TaskStepStatus,
    /// Position in the default linear sequence.
    pub step_order: i32,
    /// Whether the step requires an outcome selection.
    #[serde(default)]
    pub is_conditional: bool,
    /// Whether the step always requires the answered/did-not-answer outcome.
    #[serde(default)]
    pub forced_conditional: bool,
    /// Kind of value recorded on success.
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_record_type: SuccessRecordType,
    /// Authored outcomes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_options: Vec<SuccessOption>,
    /// Resolution timestamp.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Who resolved the step.
    #[serde(default)]
    pub performed_by: Option<String>,
}

impl TaskStepInput {
    /// Creates a pending, unconditional step input.
    #[must_use]
    pub fn pending(id: i64, name: impl Into<String>, step_order: i32) -> Self {
        Self {
            id: StepId::new(id),
            template_step_id: None,
            name: name.into(),
            status: TaskStepStatus::Pending,
            step_order,
            is_conditional: false,
            forced_conditional: false,
            success_record_type: SuccessRecordType::None,
            success_options: Vec::new(),
            completed_at: None,
            performed_by: None,
        }
    }
}

/// One step instance inside a running workflow task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskStepInput")]
pub struct TaskStep {
    id: StepId,
    template_step_id: Option<i64>,
    name: NonEmptyString,
    status: TaskStepStatus,
    step_order: i32,
    is_conditional: bool,
    forced_conditional: bool,
    success_record_type: SuccessRecordType,
    success_options: Vec<SuccessOption>,
    completed_at: Option<DateTime<Utc>>,
    performed_by: Option<String>,
}

impl TaskStep {
    /// Creates a validated task step.
    pub fn new(input: TaskStepInput) -> AppResult<Self> {
        let TaskStepInput {
            id,
            template_step_id,
            name,
            status,
            step_order,
            is_conditional,
            forced_conditional,
            success_record_type,
            success_options,
            completed_at,
            performed_by,
        } = input;

        let name = NonEmptyString::new(name)
            .map_err(|_| AppError::Validation(format!("step {id} requires a name")))?;

        let mut seen_option_ids = HashSet::new();
        for option in &success_options {
            if !seen_option_ids.insert(option.id()) {
                return Err(AppError::Validation(format!(
                    "step '{name}' has duplicate success option '{}'",
                    option.id()
                )));
            }
        }

        Ok(Self {
            id,
            template_step_id,
            name,
            status,
            step_order,
            is_conditional,
            forced_conditional,
            success_record_type,
            success_options,
            completed_at,
            performed_by,
        })
    }

    /// Returns step identifier.
    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    /// Returns authored template step reference.
    #[must_use]
    pub fn template_step_id(&self) -> Option<i64> {
        self.template_step_id
    }

    /// Returns step display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns current status.
    #[must_use]
    pub fn status(&self) -> TaskStepStatus {
        self.status
    }

    /// Returns position in the default sequence.
    #[must_use]
    pub fn step_order(&self) -> i32 {
        self.step_order
    }

    /// Returns the authored conditional flag.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.is_conditional
    }

    /// Returns the explicit call-outcome flag.
    #[must_use]
    pub fn forced_conditional(&self) -> bool {
        self.forced_conditional
    }

    /// Returns whether this step requires the answered/did-not-answer outcome,
    /// either by flag or by the legacy step name.
    #[must_use]
    pub fn is_call_outcome_step(&self) -> bool {
        self.forced_conditional
            || self
                .name
                .as_str()
                .split_whitespace()
                .map(str::to_ascii_lowercase)
                .eq(CALL_OUTCOME_STEP_NAME
                    .split_whitespace()
                    .map(str::to_ascii_lowercase))
    }

    /// Returns kind of value recorded on success.
    #[must_use]
    pub fn success_record_type(&self) -> SuccessRecordType {
        self.success_record_type
    }

    /// Returns authored outcomes.
    #[must_use]
    pub fn success_options(&self) -> &[SuccessOption] {
        &self.success_options
    }

    /// Finds an authored outcome by id, then by label.
    #[must_use]
    pub fn success_option(&self, selected: &str) -> Option<&SuccessOption> {
        self.success_options
            .iter()
            .find(|option| option.id() == selected)
            .or_else(|| {
                self.success_options
                    .iter()
                    .find(|option| option.label() == selected)
            })
    }

    /// Returns resolution timestamp.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns who resolved the step.
    #[must_use]
    pub fn performed_by(&self) -> Option<&str> {
        self.performed_by.as_deref()
    }

    /// Applies one forward status transition.
    pub fn transition_to(
        &mut self,
        next: TaskStepStatus,
        at: DateTime<Utc>,
        performed_by: Option<&str>,
    ) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "step {} cannot move from '{}' to '{}'",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(at);
            self.performed_by = performed_by.map(ToOwned::to_owned);
        }

        Ok(())
    }

    /// Resets the step to pending so it runs again without creating a new instance.
    pub fn reopen(&mut self) {
        self.status = TaskStepStatus::Pending;
        self.completed_at = None;
        self.performed_by = None;
    }
}

/// A jump outcome with no target or a target order that matches no step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidJumpTarget {
    /// Step carrying the option.
    pub step_id: StepId,
    /// Offending option id.
    pub option_id: String,
    /// Target order that has no matching step, `None` when the option names none.
    pub next_step: Option<i32>,
}

impl Display for InvalidJumpTarget {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.next_step {
            Some(next_step) => write!(
                formatter,
                "step {} option '{}' jumps to missing step order {next_step}",
                self.step_id, self.option_id
            ),
            None => write!(
                formatter,
                "step {} option '{}' jumps without a next_step",
                self.step_id, self.option_id
            ),
        }
    }
}

/// Input payload used to construct a workflow task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowTaskInput {
    /// Task identifier.
    pub id: TaskId,
    /// Originating template.
    #[serde(default)]
    pub template_id: Option<i64>,
    /// Step instances in any order.
    #[serde(default)]
    pub steps: Vec<TaskStep>,
    /// Reported progress, 0 to 100.
    #[serde(default)]
    pub completion_percentage: f64,
}

/// Workflow task instantiated from a template for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkflowTaskInput")]
pub struct WorkflowTask {
    id: TaskId,
    template_id: Option<i64>,
    steps: Vec<TaskStep>,
    completion_percentage: f64,
}

impl WorkflowTask {
    /// Creates a validated task with steps sorted by `step_order`.
    pub fn new(input: WorkflowTaskInput) -> AppResult<Self> {
        let WorkflowTaskInput {
            id,
            template_id,
            mut steps,
            completion_percentage,
        } = input;

        if !(0.0..=100.0).contains(&completion_percentage) {
            return Err(AppError::Validation(format!(
                "task {id} completion_percentage must be between 0 and 100"
            )));
        }

        let mut seen_ids = HashSet::new();
        let mut seen_orders = HashSet::new();
        for step in &steps {
            if !seen_ids.insert(step.id()) {
                return Err(AppError::Validation(format!(
                    "task {id} has duplicate step id {}",
                    step.id()
                )));
            }

            if !seen_orders.insert(step.step_order()) {
                return Err(AppError::Validation(format!(
                    "task {id} has duplicate step_order {}",
                    step.step_order()
                )));
            }
        }

        steps.sort_by_key(TaskStep::step_order);

        Ok(Self {
            id,
            template_id,
            steps,
            completion_percentage,
        })
    }

    /// Returns task identifier.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns originating template.
    #[must_use]
    pub fn template_id(&self) -> Option<i64> {
        self.template_id
    }

    /// Returns steps in ascending `step_order`.
    #[must_use]
    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    /// Returns reported progress.
    #[must_use]
    pub fn completion_percentage(&self) -> f64 {
        self.completion_percentage
    }

    /// Returns one step by id.
    #[must_use]
    pub fn step(&self, step_id: StepId) -> Option<&TaskStep> {
        self.steps.iter().find(|step| step.id() == step_id)
    }

    /// Returns one step by order.
    #[must_use]
    pub fn step_by_order(&self, step_order: i32) -> Option<&TaskStep> {
        self.steps
            .binary_search_by_key(&step_order, TaskStep::step_order)
            .ok()
            .and_then(|position| self.steps.get(position))
    }

    /// Returns one mutable step by id for the data layer applying a completion.
    pub fn step_mut(&mut self, step_id: StepId) -> Option<&mut TaskStep> {
        self.steps.iter_mut().find(|step| step.id() == step_id)
    }

    /// Returns mutable steps in ascending `step_order`.
    pub fn steps_mut(&mut self) -> impl Iterator<Item = &mut TaskStep> {
        self.steps.iter_mut()
    }

    /// Returns whether every step is completed, failed, or skipped.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.steps.iter().all(|step| step.status().is_terminal())
    }

    /// Recomputes progress from terminal step count.
    pub fn recompute_completion_percentage(&mut self) {
        if self.steps.is_empty() {
            self.completion_percentage = 100.0;
            return;
        }

        let resolved = self
            .steps
            .iter()
            .filter(|step| step.status().is_terminal())
            .count();
        self.completion_percentage = (resolved as f64 * 100.0 / self.steps.len() as f64).round();
    }

    /// Lists jump outcomes whose targets are missing from this task.
    #[must_use]
    pub fn invalid_jump_targets(&self) -> Vec<InvalidJumpTarget> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.success_options().iter().filter_map(move |option| {
                    let missing = option.is_untargeted_jump()
                        || option
                            .next_step()
                            .is_some_and(|next_step| self.step_by_order(next_step).is_none());
                    missing.then(|| InvalidJumpTarget {
                        step_id: step.id(),
                        option_id: option.id().to_owned(),
                        next_step: option.next_step(),
                    })
                })
            })
            .collect()
    }
}

impl TryFrom<TaskStepInput> for TaskStep {
    type Error = AppError;

    fn try_from(value: TaskStepInput) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<WorkflowTaskInput> for WorkflowTask {
    type Error = AppError;

    fn try_from(value: WorkflowTaskInput) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
