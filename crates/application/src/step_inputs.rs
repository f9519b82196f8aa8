use fieldops_domain::StepId;

/// Transient inputs collected for the active step.
///
/// Holds one set of values at a time, scoped to a single step id. Values never
/// carry over to another step or to a re-entered step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepInputs {
    step_id: Option<StepId>,
    selected_option: Option<String>,
    text_value: Option<String>,
    number_value: Option<String>,
    checkbox_value: Option<bool>,
}

impl StepInputs {
    /// Creates blank inputs scoped to a step.
    #[must_use]
    pub fn for_step(step_id: Option<StepId>) -> Self {
        Self {
            step_id,
            ..Self::default()
        }
    }

    /// Returns the step these inputs belong to.
    #[must_use]
    pub fn step_id(&self) -> Option<StepId> {
        self.step_id
    }

    /// Rescopes to `step_id`, clearing values when the step differs.
    /// Returns whether values were cleared.
    pub fn scope_to(&mut self, step_id: Option<StepId>) -> bool {
        if self.step_id == step_id {
            return false;
        }

        *self = Self::for_step(step_id);
        true
    }

    /// Clears every value while keeping the step scope.
    pub fn reset(&mut self) {
        *self = Self::for_step(self.step_id);
    }

    /// Returns whether no value has been entered.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.selected_option.is_none()
            && self.text_value.is_none()
            && self.number_value.is_none()
            && self.checkbox_value.is_none()
    }

    /// Records the selected outcome.
    pub fn select_outcome(&mut self, value: impl Into<String>) {
        self.selected_option = Some(value.into());
    }

    /// Records free text.
    pub fn set_text_value(&mut self, value: impl Into<String>) {
        self.text_value = Some(value.into());
    }

    /// Records the raw numeric input; parsing happens at resolution.
    pub fn set_number_value(&mut self, value: impl Into<String>) {
        self.number_value = Some(value.into());
    }

    /// Records the checkbox state.
    pub fn set_checkbox_value(&mut self, value: bool) {
        self.checkbox_value = Some(value);
    }

    /// Returns the selected outcome.
    #[must_use]
    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    /// Returns free text.
    #[must_use]
    pub fn text_value(&self) -> Option<&str> {
        self.text_value.as_deref()
    }

    /// Returns the raw numeric input.
    #[must_use]
    pub fn number_value(&self) -> Option<&str> {
        self.number_value.as_deref()
    }

    /// Returns the checkbox state.
    #[must_use]
    pub fn checkbox_value(&self) -> Option<bool> {
        self.checkbox_value
    }
}

#[cfg(test)]
mod tests {
    use fieldops_domain::StepId;

    use super::StepInputs;

    #[test]
    fn rescoping_to_another_step_clears_values() {
        let mut inputs = StepInputs::for_step(Some(StepId::new(1)));
        inputs.select_outcome("ok");
        inputs.set_number_value("12");

        assert!(!inputs.scope_to(Some(StepId::new(1))));
        assert_eq!(inputs.selected_option(), Some("ok"));

        assert!(inputs.scope_to(Some(StepId::new(2))));
        assert!(inputs.is_blank());
        assert_eq!(inputs.step_id(), Some(StepId::new(2)));
    }

    #[test]
    fn reset_keeps_scope() {
        let mut inputs = StepInputs::for_step(Some(StepId::new(3)));
        inputs.set_checkbox_value(false);
        inputs.set_text_value("gate code 1234");

        inputs.reset();
        assert!(inputs.is_blank());
        assert_eq!(inputs.step_id(), Some(StepId::new(3)));
    }
}
