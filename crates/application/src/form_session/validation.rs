use std::fmt::{Display, Formatter};

use fieldops_domain::{FormElement, FormElementType};
use regex::Regex;
use serde_json::Value;

use crate::condition_evaluator::{is_empty_value, value_as_number};

use super::FormSession;

/// One problem with one visible field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    /// Element name.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl Display for FieldValidationError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}: {}", self.field, self.message)
    }
}

impl FormSession {
    /// Checks every visible, value-bearing element. Hidden fields never fail.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldValidationError> {
        self.visible_elements()
            .filter(|element| element.carries_value())
            .filter_map(|element| {
                let pattern = self.schema.pattern_for(element.name());
                check_element(element, self.values.get(element.name()), pattern).map(|message| {
                    FieldValidationError {
                        field: element.name().to_owned(),
                        message,
                    }
                })
            })
            .collect()
    }
}

fn check_element(
    element: &FormElement,
    value: Option<&Value>,
    pattern: Option<&Regex>,
) -> Option<String> {
    let label = element.label();

    if is_blank(value) {
        return element
            .required()
            .then(|| format!("{label} is required"));
    }
    let value = value?;

    match element.element_type() {
        element_type if element_type.is_numeric() => check_number(element, value),
        FormElementType::Checkbox => match value {
            Value::Bool(false) if element.required() => Some(format!("{label} must be checked")),
            Value::Bool(_) => None,
            _ => Some(format!("{label} must be checked or unchecked")),
        },
        element_type if element_type.is_choice() => {
            let selected = value.as_str().unwrap_or_default();
            (!element.options().iter().any(|option| option == selected))
                .then(|| format!("{label} must be one of the listed options"))
        }
        FormElementType::Email => check_text(element, value, pattern).or_else(|| {
            value
                .as_str()
                .is_some_and(|text| !looks_like_email(text))
                .then(|| format!("{label} must be an email address"))
        }),
        _ => check_text(element, value, pattern),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    is_empty_value(value)
        || matches!(value, Some(Value::Array(items)) if items.is_empty())
}

fn check_number(element: &FormElement, value: &Value) -> Option<String> {
    let label = element.label();
    let Some(number) = value_as_number(value) else {
        return Some(format!("{label} must be a number"));
    };

    let validation = element.validation()?;
    if let Some(min) = validation.min
        && number < min
    {
        return Some(format!("{label} must be at least {min}"));
    }
    if let Some(max) = validation.max
        && number > max
    {
        return Some(format!("{label} must be at most {max}"));
    }
    None
}

fn check_text(element: &FormElement, value: &Value, pattern: Option<&Regex>) -> Option<String> {
    let label = element.label();
    let validation = element.validation()?;
    let text = value.as_str()?;
    let length = text.chars().count();

    if let Some(min_length) = validation.min_length
        && length < min_length
    {
        return Some(format!("{label} must be at least {min_length} characters"));
    }
    if let Some(max_length) = validation.max_length
        && length > max_length
    {
        return Some(format!("{label} must be at most {max_length} characters"));
    }
    if pattern.is_some_and(|pattern| !pattern.is_match(text)) {
        return Some(format!("{label} has an invalid format"));
    }
    None
}

fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !text.chars().any(char::is_whitespace)
        && domain.split_once('.').is_some_and(|(host, rest)| {
            !host.is_empty() && !rest.is_empty() && !rest.ends_with('.')
        })
}
