use fieldops_core::{AppError, AppResult};
use fieldops_domain::{FieldValues, FormElement, FormSchema};
use serde_json::Value;

use crate::visibility_resolver::{VisibilitySet, resolve_visibility};

mod submission;
mod validation;

pub use submission::SubmissionContext;
pub use validation::FieldValidationError;

/// Per-form owner of the current values and the derived visible set.
///
/// The visible set is recomputed after every mutation.
#[derive(Debug, Clone)]
pub struct FormSession {
    schema: FormSchema,
    values: FieldValues,
    visible: VisibilitySet,
}

impl FormSession {
    /// Opens a session with no values entered.
    #[must_use]
    pub fn new(schema: FormSchema) -> Self {
        let values = FieldValues::new();
        let visible = resolve_visibility(schema.elements(), &values);
        Self {
            schema,
            values,
            visible,
        }
    }

    /// Opens a session prefilled with saved values.
    pub fn with_values(schema: FormSchema, values: FieldValues) -> AppResult<Self> {
        let mut session = Self::new(schema);
        session.replace_values(values)?;
        Ok(session)
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Returns the current values keyed by element name.
    #[must_use]
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Returns the ids of the visible elements.
    #[must_use]
    pub fn visible_ids(&self) -> &VisibilitySet {
        &self.visible
    }

    /// Returns whether the element with `name` is visible.
    #[must_use]
    pub fn is_visible(&self, name: &str) -> bool {
        self.schema
            .element_by_name(name)
            .is_some_and(|element| self.visible.contains(element.id()))
    }

    /// Returns the visible elements in schema order.
    pub fn visible_elements(&self) -> impl Iterator<Item = &FormElement> {
        self.schema
            .elements()
            .iter()
            .filter(|element| self.visible.contains(element.id()))
    }

    /// Sets one value. `null` clears it.
    pub fn set_value(&mut self, name: &str, value: Value) -> AppResult<()> {
        self.value_element(name)?;
        if value.is_null() {
            self.values.remove(name);
        } else {
            self.values.insert(name.to_owned(), value);
        }
        self.recompute_visibility();
        Ok(())
    }

    /// Clears one value.
    pub fn clear_value(&mut self, name: &str) -> AppResult<()> {
        self.set_value(name, Value::Null)
    }

    /// Replaces every value at once.
    pub fn replace_values(&mut self, values: FieldValues) -> AppResult<()> {
        for name in values.keys() {
            self.value_element(name)?;
        }

        self.values = values
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();
        self.recompute_visibility();
        Ok(())
    }

    fn value_element(&self, name: &str) -> AppResult<&FormElement> {
        let element = self
            .schema
            .element_by_name(name)
            .ok_or_else(|| AppError::NotFound(format!("form has no field named '{name}'")))?;

        if !element.carries_value() {
            return Err(AppError::Validation(format!(
                "{} element '{name}' does not hold a value",
                element.element_type().as_str()
            )));
        }

        Ok(element)
    }

    fn recompute_visibility(&mut self) {
        self.visible = resolve_visibility(self.schema.elements(), &self.values);
    }
}

#[cfg(test)]
mod tests;
