use chrono::{DateTime, Utc};
use fieldops_core::{AppError, AppResult};
use fieldops_domain::{FieldValues, FormMetadata, FormSubmission, GpsLocation};

use super::FormSession;

/// Facts about the submission not held by the form itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionContext {
    /// Form display name.
    pub form_name: String,
    /// Form category.
    pub form_type: String,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Whether the device had no connectivity.
    pub offline: bool,
    /// Captured location, if capture succeeded.
    pub gps_location: Option<GpsLocation>,
}

impl FormSession {
    /// Builds the submission from the visible values.
    ///
    /// Refuses when any visible field fails validation, or when the form is
    /// submitted offline but does not allow it.
    pub fn build_submission(&self, context: SubmissionContext) -> AppResult<FormSubmission> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
        }

        let settings = self.schema.settings();
        if context.offline && !settings.allow_offline {
            return Err(AppError::Validation(format!(
                "form '{}' cannot be submitted offline",
                context.form_name
            )));
        }

        let values: FieldValues = self
            .visible_elements()
            .filter(|element| element.carries_value())
            .filter_map(|element| {
                self.values
                    .get(element.name())
                    .map(|value| (element.name().to_owned(), value.clone()))
            })
            .collect();

        let gps_location = settings
            .require_gps_location
            .then_some(context.gps_location);

        Ok(FormSubmission::new(
            values,
            gps_location,
            FormMetadata {
                form_name: context.form_name,
                form_type: context.form_type,
                submitted_at: context.submitted_at,
                offline: context.offline,
            },
        ))
    }
}
