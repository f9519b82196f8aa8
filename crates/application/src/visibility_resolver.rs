use std::collections::{BTreeSet, HashSet};

use fieldops_domain::{FieldValues, FormElement, VisibilityAction};

use crate::condition_evaluator::evaluate_condition;

/// Ids of the elements currently visible.
pub type VisibilitySet = BTreeSet<String>;

/// Computes the visible element ids for the given values.
///
/// Always a full recomputation over every element: one element's visibility
/// may depend on any other element's value, so there is no incremental path.
/// Conditions referencing a name that no element carries are treated as not
/// satisfied.
#[must_use]
pub fn resolve_visibility(elements: &[FormElement], values: &FieldValues) -> VisibilitySet {
    let known_names: HashSet<&str> = elements.iter().map(FormElement::name).collect();

    elements
        .iter()
        .filter(|element| is_element_visible(element, values, &known_names))
        .map(|element| element.id().to_owned())
        .collect()
}

fn is_element_visible(
    element: &FormElement,
    values: &FieldValues,
    known_names: &HashSet<&str>,
) -> bool {
    let Some(logic) = element
        .conditional_logic()
        .filter(|logic| logic.enabled())
    else {
        return true;
    };

    let all_conditions_hold = logic.conditions().iter().all(|condition| {
        known_names.contains(condition.field()) && evaluate_condition(condition, values)
    });

    match logic.action() {
        VisibilityAction::Show => all_conditions_hold,
        VisibilityAction::Hide => !all_conditions_hold,
    }
}
