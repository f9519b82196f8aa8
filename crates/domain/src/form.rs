use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use fieldops_core::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::condition::ConditionalLogic;
use crate::submission::{FORM_METADATA_KEY, GPS_LOCATION_KEY};

/// Element catalog supported by the form renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormElementType {
    /// Single-line text.
    Text,
    /// Numeric input.
    Number,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// Multi-line text.
    Textarea,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Dropdown choice.
    Select,
    /// Radio-button choice.
    Radio,
    /// Boolean toggle.
    Checkbox,
    /// Captured photo reference.
    Photo,
    /// Captured signature reference.
    Signature,
    /// Captured device location.
    Gps,
    /// Utility meter reading.
    MeterReading,
    /// Section header, layout only.
    Header,
    /// Static paragraph, layout only.
    Paragraph,
    /// Visual divider, layout only.
    Divider,
    /// Repeating list of text entries.
    MultiInput,
}

impl FormElementType {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Textarea => "textarea",
            Self::Date => "date",
            Self::Time => "time",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Photo => "photo",
            Self::Signature => "signature",
            Self::Gps => "gps",
            Self::MeterReading => "meter_reading",
            Self::Header => "header",
            Self::Paragraph => "paragraph",
            Self::Divider => "divider",
            Self::MultiInput => "multi_input",
        }
    }

    /// Returns whether the element picks from an authored option list.
    #[must_use]
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }

    /// Returns whether the element is presentational and never carries a value.
    #[must_use]
    pub fn is_layout(&self) -> bool {
        matches!(self, Self::Header | Self::Paragraph | Self::Divider)
    }

    /// Returns whether captured values are numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::MeterReading)
    }
}

impl FromStr for FormElementType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(value.to_owned()))
            .map_err(|_| AppError::Validation(format!("unknown form element type '{value}'")))
    }
}

/// Optional value constraints attached to an element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementValidation {
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Minimum text length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum text length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regular expression the text value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ElementValidation {
    /// Checks bounds and compiles the pattern, if any.
    fn check(&self, element_name: &str) -> AppResult<Option<Regex>> {
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min > max
        {
            return Err(AppError::Validation(format!(
                "element '{element_name}' has validation min {min} greater than max {max}"
            )));
        }

        if let (Some(min_length), Some(max_length)) = (self.min_length, self.max_length)
            && min_length > max_length
        {
            return Err(AppError::Validation(format!(
                "element '{element_name}' has validation minLength {min_length} greater than maxLength {max_length}"
            )));
        }

        self.pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|error| {
                AppError::Validation(format!(
                    "element '{element_name}' has invalid validation pattern: {error}"
                ))
            })
    }
}

/// One field or layout unit in a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormElement {
    id: String,
    #[serde(rename = "type")]
    element_type: FormElementType,
    name: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validation: Option<ElementValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conditional_logic: Option<ConditionalLogic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    help_text: Option<String>,
}

impl FormElement {
    /// Creates an element with no options, constraints, or conditional logic.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        element_type: FormElementType,
        name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            element_type,
            name: name.into(),
            label: label.into(),
            required: false,
            options: Vec::new(),
            validation: None,
            conditional_logic: None,
            placeholder: None,
            help_text: None,
        }
    }

    /// Marks the element required.
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the ordered option list for choice elements.
    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches value constraints.
    #[must_use]
    pub fn with_validation(mut self, validation: ElementValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Attaches a conditional-logic block.
    #[must_use]
    pub fn with_conditional_logic(mut self, conditional_logic: ConditionalLogic) -> Self {
        self.conditional_logic = Some(conditional_logic);
        self
    }

    /// Returns stable element identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns element type.
    #[must_use]
    pub fn element_type(&self) -> FormElementType {
        self.element_type
    }

    /// Returns the data path used for the element value.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns display label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// Returns whether a value is required while the element is visible.
    #[must_use]
    pub fn required(&self) -> bool {
        self.required && !self.element_type.is_layout()
    }

    /// Returns the ordered option list.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns optional value constraints.
    #[must_use]
    pub fn validation(&self) -> Option<&ElementValidation> {
        self.validation.as_ref()
    }

    /// Returns optional conditional-logic block.
    #[must_use]
    pub fn conditional_logic(&self) -> Option<&ConditionalLogic> {
        self.conditional_logic.as_ref()
    }

    /// Returns optional input placeholder.
    #[must_use]
    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    /// Returns optional help text.
    #[must_use]
    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    /// Returns whether the element captures a value.
    #[must_use]
    pub fn carries_value(&self) -> bool {
        !self.element_type.is_layout()
    }
}

/// Form-wide behavior flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    /// Capture the device location with every submission.
    #[serde(default)]
    pub require_gps_location: bool,
    /// Allow queueing submissions while offline.
    #[serde(default)]
    pub allow_offline: bool,
    /// Optional submit button label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
}

/// Authoring payload exchanged between the template editor and the renderer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormSchemaDocument {
    /// Ordered form elements.
    #[serde(default)]
    pub elements: Vec<FormElement>,
    /// Form-wide settings.
    #[serde(default)]
    pub settings: FormSettings,
}

/// Validated form schema with a name index and compiled patterns built at load time.
#[derive(Debug, Clone)]
pub struct FormSchema {
    elements: Vec<FormElement>,
    settings: FormSettings,
    name_index: HashMap<String, usize>,
    patterns: HashMap<String, Regex>,
}

impl FormSchema {
    /// Validates an authoring document and indexes its elements by name.
    pub fn new(document: FormSchemaDocument) -> AppResult<Self> {
        let FormSchemaDocument { elements, settings } = document;

        let mut seen_ids = HashSet::new();
        let mut name_index = HashMap::with_capacity(elements.len());
        let mut patterns = HashMap::new();
        for (position, element) in elements.iter().enumerate() {
            if element.id.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "element at position {position} requires an id"
                )));
            }

            if !seen_ids.insert(element.id.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate element id '{}'",
                    element.id
                )));
            }

            if element.name.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "element '{}' requires a name",
                    element.id
                )));
            }

            if element.name == GPS_LOCATION_KEY || element.name == FORM_METADATA_KEY {
                return Err(AppError::Validation(format!(
                    "element name '{}' is reserved for submission metadata",
                    element.name
                )));
            }

            if name_index.insert(element.name.clone(), position).is_some() {
                return Err(AppError::Validation(format!(
                    "duplicate element name '{}'",
                    element.name
                )));
            }

            if element.element_type.is_choice() && element.options.is_empty() {
                return Err(AppError::Validation(format!(
                    "{} element '{}' requires at least one option",
                    element.element_type.as_str(),
                    element.name
                )));
            }

            if let Some(validation) = &element.validation
                && let Some(pattern) = validation.check(element.name.as_str())?
            {
                patterns.insert(element.name.clone(), pattern);
            }
        }

        for element in &elements {
            let Some(logic) = &element.conditional_logic else {
                continue;
            };

            for condition in logic.conditions() {
                if !name_index.contains_key(condition.field()) {
                    return Err(AppError::Validation(format!(
                        "element '{}' has a condition referencing unknown field '{}'",
                        element.name,
                        condition.field()
                    )));
                }
            }
        }

        Ok(Self {
            elements,
            settings,
            name_index,
            patterns,
        })
    }

    /// Parses and validates a JSON authoring document.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let document = serde_json::from_str::<FormSchemaDocument>(document)
            .map_err(|error| {
                AppError::Validation(format!("invalid form schema document: {error}"))
            })?;
        Self::new(document)
    }

    /// Returns ordered elements.
    #[must_use]
    pub fn elements(&self) -> &[FormElement] {
        &self.elements
    }

    /// Returns form-wide settings.
    #[must_use]
    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    /// Returns one element by its data name.
    #[must_use]
    pub fn element_by_name(&self, name: &str) -> Option<&FormElement> {
        self.name_index
            .get(name)
            .and_then(|position| self.elements.get(*position))
    }

    /// Returns the compiled validation pattern of one element.
    #[must_use]
    pub fn pattern_for(&self, name: &str) -> Option<&Regex> {
        self.patterns.get(name)
    }
}
