//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod condition;
mod form;
mod submission;
mod task;

pub use condition::{Condition, ConditionOperator, ConditionalLogic, VisibilityAction};
pub use form::{
    ElementValidation, FormElement, FormElementType, FormSchema, FormSchemaDocument, FormSettings,
};
pub use submission::{
    FORM_METADATA_KEY, FormMetadata, FormSubmission, GPS_LOCATION_KEY, GpsLocation,
};
pub use task::{
    CALL_OUTCOME_STEP_NAME, InvalidJumpTarget, StepId, SuccessAction, SuccessOption,
    SuccessOptionInput, SuccessRecordType, TaskId, TaskStep, TaskStepInput, TaskStepStatus,
    WorkflowTask, WorkflowTaskInput,
};

/// Current field values keyed by element name or payload key.
pub type FieldValues = serde_json::Map<String, serde_json::Value>;
