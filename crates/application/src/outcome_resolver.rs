use fieldops_core::{AppError, AppResult};
use fieldops_domain::{
    FieldValues, StepId, SuccessAction, SuccessRecordType, TaskStep, WorkflowTask,
};
use serde_json::{Number, Value};

use crate::step_inputs::StepInputs;
use crate::step_state_machine::{ControlAction, StepStateMachine};

/// Outcome value for a reached homeowner.
pub const CALL_ANSWERED: &str = "answered";
/// Outcome value for an unanswered call.
pub const CALL_DID_NOT_ANSWER: &str = "did_not_answer";
/// Wire value sent for an unanswered call.
pub const CALL_REPEAT: &str = "repeat";
/// Generic fallback outcome for a successful step.
pub const GENERIC_SUCCESS: &str = "success";
/// Generic fallback outcome for an unsuccessful step.
pub const GENERIC_FAILURE: &str = "failure";

/// Payload key carrying the chosen outcome.
pub const SELECTED_OPTION_KEY: &str = "selected_option";
/// Payload key carrying free text.
pub const TEXT_VALUE_KEY: &str = "text_value";
/// Payload key carrying a numeric reading.
pub const NUMBER_VALUE_KEY: &str = "number_value";
/// Payload key carrying a checkbox state.
pub const CHECKBOX_VALUE_KEY: &str = "checkbox_value";

/// How a step collects its outcome, by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcomeKind {
    /// Resolves without input.
    Immediate,
    /// Answered or did not answer.
    CallOutcome,
    /// One of the authored success options.
    AuthoredOptions,
    /// Generic success or failure fallback.
    GenericChoice,
}

impl StepOutcomeKind {
    /// Classifies a step.
    #[must_use]
    pub fn classify(step: &TaskStep) -> Self {
        if step.is_call_outcome_step() {
            return Self::CallOutcome;
        }

        if !step.is_conditional() {
            return Self::Immediate;
        }

        if step.success_options().is_empty() {
            Self::GenericChoice
        } else {
            Self::AuthoredOptions
        }
    }
}

/// One selectable outcome for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeChoice {
    /// Value to pass to [`StepInputs::select_outcome`].
    pub value: String,
    /// Display label.
    pub label: String,
}

impl OutcomeChoice {
    fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Result of resolving the active step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutcome {
    /// Resolved step.
    pub step_id: StepId,
    /// Values recorded with the completion.
    pub field_values: FieldValues,
    /// What runs next.
    pub control_action: ControlAction,
}

/// Lists the outcomes a user can choose for a step.
#[must_use]
pub fn outcome_choices(step: &TaskStep) -> Vec<OutcomeChoice> {
    match StepOutcomeKind::classify(step) {
        StepOutcomeKind::Immediate => Vec::new(),
        StepOutcomeKind::CallOutcome => vec![
            OutcomeChoice::new(CALL_ANSWERED, "Answered"),
            OutcomeChoice::new(CALL_DID_NOT_ANSWER, "Did not answer"),
        ],
        StepOutcomeKind::AuthoredOptions => step
            .success_options()
            .iter()
            .map(|option| OutcomeChoice::new(option.id(), option.label()))
            .collect(),
        StepOutcomeKind::GenericChoice => generic_choices(),
    }
}

/// Maps the collected inputs for `step` to a completion payload and control action.
///
/// Fails with a validation error when a required outcome or input is missing
/// and with a configuration error when a jump target does not exist in `task`.
pub fn resolve_outcome(
    task: &WorkflowTask,
    step: &TaskStep,
    inputs: &StepInputs,
) -> AppResult<ResolvedOutcome> {
    if task.step(step.id()).is_none() {
        return Err(AppError::NotFound(format!(
            "step {} is not part of task {}",
            step.id(),
            task.id()
        )));
    }

    if inputs.step_id().is_some_and(|scoped| scoped != step.id()) {
        return Err(AppError::Conflict(format!(
            "collected inputs belong to another step than '{}'",
            step.name()
        )));
    }

    let kind = StepOutcomeKind::classify(step);
    let mut field_values = FieldValues::new();

    let control_action = match kind {
        StepOutcomeKind::Immediate => {
            return Ok(ResolvedOutcome {
                step_id: step.id(),
                field_values,
                control_action: ControlAction::Advance,
            });
        }
        StepOutcomeKind::CallOutcome => {
            let selected = required_selection(step, inputs)?;
            let (wire_value, action) = resolve_call_outcome(step, selected)?;
            field_values.insert(SELECTED_OPTION_KEY.to_owned(), Value::from(wire_value));
            action
        }
        StepOutcomeKind::AuthoredOptions => {
            let selected = required_selection(step, inputs)?;
            let option = step.success_option(selected).ok_or_else(|| {
                AppError::Validation(format!(
                    "'{selected}' is not an outcome of step '{}'",
                    step.name()
                ))
            })?;
            let action = match option.action() {
                SuccessAction::Next => ControlAction::Advance,
                SuccessAction::Repeat => ControlAction::Repeat,
                SuccessAction::Jump => {
                    let step_order = option.next_step().ok_or_else(|| {
                        AppError::Configuration(format!(
                            "outcome '{}' of step '{}' jumps without a target step",
                            option.id(),
                            step.name()
                        ))
                    })?;
                    ControlAction::Jump { step_order }
                }
            };
            field_values.insert(SELECTED_OPTION_KEY.to_owned(), Value::from(option.id()));
            action
        }
        StepOutcomeKind::GenericChoice => {
            let selected = if step.success_record_type().is_freeform() {
                inputs
                    .selected_option()
                    .filter(|selected| !selected.trim().is_empty())
            } else {
                Some(required_selection(step, inputs)?)
            };

            if let Some(selected) = selected {
                let value = resolve_generic_choice(step, selected)?;
                field_values.insert(SELECTED_OPTION_KEY.to_owned(), Value::from(value));
            }
            ControlAction::Advance
        }
    };

    StepStateMachine::new(task).target_for(step, control_action)?;
    collect_freeform_value(step, inputs, &mut field_values)?;

    Ok(ResolvedOutcome {
        step_id: step.id(),
        field_values,
        control_action,
    })
}

fn generic_choices() -> Vec<OutcomeChoice> {
    vec![
        OutcomeChoice::new(GENERIC_SUCCESS, "Success"),
        OutcomeChoice::new(GENERIC_FAILURE, "Failure"),
    ]
}

fn required_selection<'a>(step: &TaskStep, inputs: &'a StepInputs) -> AppResult<&'a str> {
    inputs
        .selected_option()
        .map(str::trim)
        .filter(|selected| !selected.is_empty())
        .ok_or_else(|| {
            AppError::Validation(format!("select an outcome for step '{}'", step.name()))
        })
}

fn resolve_call_outcome(
    step: &TaskStep,
    selected: &str,
) -> AppResult<(&'static str, ControlAction)> {
    let normalized = normalize_choice(selected);
    if normalized == CALL_ANSWERED {
        Ok((CALL_ANSWERED, ControlAction::Advance))
    } else if normalized == CALL_DID_NOT_ANSWER {
        Ok((CALL_REPEAT, ControlAction::Repeat))
    } else {
        Err(AppError::Validation(format!(
            "step '{}' needs 'answered' or 'did not answer', got '{selected}'",
            step.name()
        )))
    }
}

fn resolve_generic_choice(step: &TaskStep, selected: &str) -> AppResult<&'static str> {
    match normalize_choice(selected).as_str() {
        GENERIC_SUCCESS => Ok(GENERIC_SUCCESS),
        GENERIC_FAILURE => Ok(GENERIC_FAILURE),
        _ => Err(AppError::Validation(format!(
            "step '{}' needs 'success' or 'failure', got '{selected}'",
            step.name()
        ))),
    }
}

fn normalize_choice(selected: &str) -> String {
    selected
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_lowercase()
}

fn collect_freeform_value(
    step: &TaskStep,
    inputs: &StepInputs,
    field_values: &mut FieldValues,
) -> AppResult<()> {
    match step.success_record_type() {
        SuccessRecordType::None | SuccessRecordType::Dropdown => Ok(()),
        SuccessRecordType::Text => {
            let text = inputs
                .text_value()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .ok_or_else(|| {
                    AppError::Validation(format!("enter a note for step '{}'", step.name()))
                })?;
            field_values.insert(TEXT_VALUE_KEY.to_owned(), Value::from(text));
            Ok(())
        }
        SuccessRecordType::Number => {
            let raw = inputs
                .number_value()
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .ok_or_else(|| {
                    AppError::Validation(format!("enter a number for step '{}'", step.name()))
                })?;
            let number = parse_number(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "'{raw}' is not a valid number for step '{}'",
                    step.name()
                ))
            })?;
            field_values.insert(NUMBER_VALUE_KEY.to_owned(), Value::Number(number));
            Ok(())
        }
        SuccessRecordType::Checkbox => {
            let checked = inputs.checkbox_value().ok_or_else(|| {
                AppError::Validation(format!(
                    "confirm the checkbox for step '{}'",
                    step.name()
                ))
            })?;
            field_values.insert(CHECKBOX_VALUE_KEY.to_owned(), Value::Bool(checked));
            Ok(())
        }
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Some(Number::from(integer));
    }

    raw.parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .and_then(Number::from_f64)
}
