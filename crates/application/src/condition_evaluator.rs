use std::cmp::Ordering;

use fieldops_domain::{Condition, ConditionOperator, FieldValues};
use serde_json::Value;

/// Evaluates one condition against the current field values.
///
/// Never fails: malformed input (unknown operator, non-numeric operands for
/// ordering comparisons) evaluates to `false`. A field missing from `values`
/// is treated as an unset value.
#[must_use]
pub fn evaluate_condition(condition: &Condition, values: &FieldValues) -> bool {
    let field_value = values.get(condition.field());
    let operand = condition.value();

    match condition.operator() {
        ConditionOperator::Equals => values_equal(field_value, operand),
        ConditionOperator::NotEquals => !values_equal(field_value, operand),
        ConditionOperator::Contains => value_contains(field_value, operand),
        ConditionOperator::NotContains => !value_contains(field_value, operand),
        ConditionOperator::GreaterThan => {
            compare_numbers(field_value, operand).is_some_and(Ordering::is_gt)
        }
        ConditionOperator::LessThan => {
            compare_numbers(field_value, operand).is_some_and(Ordering::is_lt)
        }
        ConditionOperator::IsEmpty => is_empty_value(field_value),
        ConditionOperator::IsNotEmpty => !is_empty_value(field_value),
        ConditionOperator::Unknown => false,
    }
}

/// Returns true for an unset value, `null`, or the empty string.
#[must_use]
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

/// Parses a JSON number or numeric string into a finite float.
#[must_use]
pub fn value_as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

/// Renders a value the way comparisons see it.
#[must_use]
pub fn value_to_comparable_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other @ (Value::Array(_) | Value::Object(_))) => other.to_string(),
    }
}

fn values_equal(field_value: Option<&Value>, operand: &Value) -> bool {
    if let (Some(left), Some(right)) = (
        field_value.and_then(value_as_number),
        value_as_number(operand),
    ) {
        return left == right;
    }

    value_to_comparable_string(field_value) == value_to_comparable_string(Some(operand))
}

fn value_contains(field_value: Option<&Value>, operand: &Value) -> bool {
    let needle = value_to_comparable_string(Some(operand));

    match field_value {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| value_to_comparable_string(Some(item)) == needle),
        other => value_to_comparable_string(other).contains(needle.as_str()),
    }
}

fn compare_numbers(field_value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    let left = field_value.and_then(value_as_number)?;
    let right = value_as_number(operand)?;
    left.partial_cmp(&right)
}
