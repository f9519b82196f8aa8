//! Application services and ports.

#![forbid(unsafe_code)]

mod condition_evaluator;
mod form_session;
mod outcome_resolver;
mod step_inputs;
mod step_state_machine;
mod task_ports;
mod task_workflow_service;
mod visibility_resolver;
mod workflow_session;

pub use condition_evaluator::{
    evaluate_condition, is_empty_value, value_as_number, value_to_comparable_string,
};
pub use form_session::{FieldValidationError, FormSession, SubmissionContext};
pub use outcome_resolver::{
    CALL_ANSWERED, CALL_DID_NOT_ANSWER, CALL_REPEAT, CHECKBOX_VALUE_KEY, GENERIC_FAILURE,
    GENERIC_SUCCESS, NUMBER_VALUE_KEY, OutcomeChoice, ResolvedOutcome, SELECTED_OPTION_KEY,
    StepOutcomeKind, TEXT_VALUE_KEY, outcome_choices, resolve_outcome,
};
pub use step_inputs::StepInputs;
pub use step_state_machine::{ControlAction, StepAction, StepStateMachine, WorkflowProgress};
pub use task_ports::{StepCompletionRequest, TaskStepGateway};
pub use task_workflow_service::TaskWorkflowService;
pub use visibility_resolver::{VisibilitySet, resolve_visibility};
pub use workflow_session::{ConfirmationState, StepTransition, WorkflowSession};
