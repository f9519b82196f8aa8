use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator used by a visibility condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Field value equals the operand.
    Equals,
    /// Field value does not equal the operand.
    NotEquals,
    /// Field value contains the operand as substring or list member.
    Contains,
    /// Field value does not contain the operand.
    NotContains,
    /// Field value is numerically greater than the operand.
    GreaterThan,
    /// Field value is numerically less than the operand.
    LessThan,
    /// Field value is missing, null, or the empty string.
    IsEmpty,
    /// Field value is present and not the empty string.
    IsNotEmpty,
    /// Operator not recognized by this engine. Always evaluates false.
    #[serde(other)]
    Unknown,
}

impl ConditionOperator {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::Unknown => "unknown",
        }
    }
}

/// Whether satisfied conditions show or hide the owning element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityAction {
    /// Element is visible only while every condition holds.
    #[default]
    Show,
    /// Element is hidden while every condition holds.
    Hide,
}

/// One comparison between another element's value and an operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    field: String,
    operator: ConditionOperator,
    #[serde(default)]
    value: Value,
}

impl Condition {
    /// Creates a condition. Unknown field references are tolerated here and
    /// rejected when a schema is loaded.
    #[must_use]
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Returns the referenced element name.
    #[must_use]
    pub fn field(&self) -> &str {
        self.field.as_str()
    }

    /// Returns condition operator.
    #[must_use]
    pub fn operator(&self) -> ConditionOperator {
        self.operator
    }

    /// Returns comparison operand.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Conditional-logic block attached to a form element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalLogic {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    action: VisibilityAction,
    #[serde(default)]
    conditions: Vec<Condition>,
}

impl ConditionalLogic {
    /// Creates a conditional-logic block whose conditions are AND-ed.
    #[must_use]
    pub fn new(enabled: bool, action: VisibilityAction, conditions: Vec<Condition>) -> Self {
        Self {
            enabled,
            action,
            conditions,
        }
    }

    /// Returns whether the block participates in visibility decisions.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns show/hide action.
    #[must_use]
    pub fn action(&self) -> VisibilityAction {
        self.action
    }

    /// Returns AND-ed condition list.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}
