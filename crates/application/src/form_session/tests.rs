use chrono::{TimeZone, Utc};
use fieldops_core::AppError;
use fieldops_domain::{
    Condition, ConditionOperator, ConditionalLogic, ElementValidation, FormElement,
    FormElementType, FormSchema, FormSchemaDocument, FormSettings, GpsLocation,
    VisibilityAction,
};
use serde_json::{Value, json};

use super::{FormSession, SubmissionContext};

fn leak_report_schema(settings: FormSettings) -> FormSchema {
    let show_when_leak = ConditionalLogic::new(
        true,
        VisibilityAction::Show,
        vec![Condition::new(
            "leak_found",
            ConditionOperator::Equals,
            json!(true),
        )],
    );

    FormSchema::new(FormSchemaDocument {
        elements: vec![
            FormElement::new("h1", FormElementType::Header, "section", "Inspection"),
            FormElement::new("a", FormElementType::Checkbox, "leak_found", "Leak found"),
            FormElement::new("b", FormElementType::Textarea, "leak_notes", "Leak notes")
                .with_required(true)
                .with_validation(ElementValidation {
                    min_length: Some(5),
                    ..ElementValidation::default()
                })
                .with_conditional_logic(show_when_leak),
            FormElement::new("c", FormElementType::Number, "pressure", "Pressure")
                .with_validation(ElementValidation {
                    min: Some(0.0),
                    max: Some(150.0),
                    ..ElementValidation::default()
                }),
            FormElement::new("d", FormElementType::Select, "severity", "Severity")
                .with_options(["low", "high"]),
            FormElement::new("e", FormElementType::Email, "contact", "Contact email"),
        ],
        settings,
    })
    .unwrap_or_else(|_| unreachable!())
}

fn context(offline: bool) -> SubmissionContext {
    SubmissionContext {
        form_name: "Leak inspection".to_owned(),
        form_type: "inspection".to_owned(),
        submitted_at: Utc
            .with_ymd_and_hms(2026, 3, 2, 14, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!()),
        offline,
        gps_location: None,
    }
}

#[test]
fn checking_the_box_reveals_the_notes_field() {
    let mut session = FormSession::new(leak_report_schema(FormSettings::default()));
    assert!(!session.is_visible("leak_notes"));

    assert!(session.set_value("leak_found", json!(true)).is_ok());
    assert!(session.is_visible("leak_notes"));

    assert!(session.clear_value("leak_found").is_ok());
    assert!(!session.is_visible("leak_notes"));
}

#[test]
fn unknown_and_layout_fields_cannot_hold_values() {
    let mut session = FormSession::new(leak_report_schema(FormSettings::default()));

    assert!(matches!(
        session.set_value("nope", json!(1)),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        session.set_value("section", json!("x")),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn hidden_required_fields_do_not_fail_validation() {
    let mut session = FormSession::new(leak_report_schema(FormSettings::default()));
    assert!(session.validate().is_empty());

    assert!(session.set_value("leak_found", json!(true)).is_ok());
    let errors = session.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "leak_notes");

    assert!(session.set_value("leak_notes", json!("drip")).is_ok());
    assert!(session.validate()[0].message.contains("at least 5"));
}

#[test]
fn values_are_checked_against_type_and_constraints() {
    let mut session = FormSession::new(leak_report_schema(FormSettings::default()));
    assert!(session.set_value("pressure", json!("high")).is_ok());
    assert!(session.set_value("severity", json!("medium")).is_ok());
    assert!(session.set_value("contact", json!("owner@localhost")).is_ok());

    let fields: Vec<String> = session
        .validate()
        .into_iter()
        .map(|error| error.field)
        .collect();
    assert_eq!(fields, vec!["pressure", "severity", "contact"]);

    assert!(session.set_value("pressure", json!(151)).is_ok());
    assert!(session.set_value("severity", json!("high")).is_ok());
    assert!(session.set_value("contact", json!("owner@example.com")).is_ok());
    let errors = session.validate();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("at most 150"));
}

#[test]
fn text_must_match_the_authored_pattern() {
    let schema = FormSchema::new(FormSchemaDocument {
        elements: vec![
            FormElement::new("m", FormElementType::Text, "meter_id", "Meter id").with_validation(
                ElementValidation {
                    pattern: Some("^M-[0-9]{4}$".to_owned()),
                    ..ElementValidation::default()
                },
            ),
        ],
        settings: FormSettings::default(),
    })
    .unwrap_or_else(|_| unreachable!());
    let mut session = FormSession::new(schema);

    assert!(session.set_value("meter_id", json!("1042")).is_ok());
    let errors = session.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "meter_id");
    assert!(errors[0].message.contains("invalid format"));

    assert!(session.set_value("meter_id", json!("M-1042")).is_ok());
    assert!(session.validate().is_empty());
}

#[test]
fn submission_carries_only_visible_values_and_metadata() {
    let schema = leak_report_schema(FormSettings {
        require_gps_location: true,
        allow_offline: false,
        submit_label: None,
    });
    let mut values = fieldops_domain::FieldValues::new();
    values.insert("leak_found".to_owned(), json!(false));
    values.insert("leak_notes".to_owned(), json!("stale note from earlier"));
    values.insert("pressure".to_owned(), json!(42));
    let session = FormSession::with_values(schema, values).unwrap_or_else(|_| unreachable!());

    let submission = session.build_submission(context(false));
    assert!(submission.is_ok());
    let payload = submission.unwrap_or_else(|_| unreachable!()).to_payload();

    assert_eq!(payload["leak_found"], json!(false));
    assert_eq!(payload["pressure"], json!(42));
    assert!(payload.get("leak_notes").is_none());
    assert_eq!(payload["_gps_location"], Value::Null);
    assert_eq!(payload["_form_metadata"]["form_name"], json!("Leak inspection"));
    assert_eq!(
        payload["_form_metadata"]["submitted_at"],
        json!("2026-03-02T14:30:00.000Z")
    );
}

#[test]
fn submission_is_refused_when_invalid_or_offline_not_allowed() {
    let mut session = FormSession::new(leak_report_schema(FormSettings::default()));
    assert!(session.set_value("leak_found", json!(true)).is_ok());
    assert!(matches!(
        session.build_submission(context(false)),
        Err(AppError::Validation(_))
    ));

    assert!(session.set_value("leak_notes", json!("pipe joint weeping")).is_ok());
    assert!(session.build_submission(context(true)).is_err());

    let mut located = context(false);
    located.gps_location = Some(GpsLocation {
        latitude: 52.37,
        longitude: 4.89,
        accuracy: Some(8.0),
        timestamp: located.submitted_at,
    });
    let submission = session
        .build_submission(located)
        .unwrap_or_else(|_| unreachable!());
    assert!(submission.gps_location().is_none());
    assert!(submission.to_payload().get("_gps_location").is_none());
}
