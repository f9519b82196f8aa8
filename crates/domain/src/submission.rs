use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::FieldValues;

/// Reserved submission key carrying the captured device location.
pub const GPS_LOCATION_KEY: &str = "_gps_location";

/// Reserved submission key carrying form metadata.
pub const FORM_METADATA_KEY: &str = "_form_metadata";

/// Device location captured alongside a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: Option<f64>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// Metadata attached to every form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormMetadata {
    /// Form display name.
    pub form_name: String,
    /// Form category, for example inspection or survey.
    pub form_type: String,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Whether the submission was captured without connectivity.
    pub offline: bool,
}

/// Captured form values ready for the data layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    values: FieldValues,
    gps_location: Option<Option<GpsLocation>>,
    metadata: FormMetadata,
}

impl FormSubmission {
    /// Creates a submission. `gps_location` is `None` when the schema does not
    /// capture location and `Some(None)` when capture was required but failed.
    #[must_use]
    pub fn new(
        values: FieldValues,
        gps_location: Option<Option<GpsLocation>>,
        metadata: FormMetadata,
    ) -> Self {
        Self {
            values,
            gps_location,
            metadata,
        }
    }

    /// Returns captured values keyed by element name.
    #[must_use]
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Returns captured location when the schema requires it.
    #[must_use]
    pub fn gps_location(&self) -> Option<Option<&GpsLocation>> {
        self.gps_location.as_ref().map(Option::as_ref)
    }

    /// Returns submission metadata.
    #[must_use]
    pub fn metadata(&self) -> &FormMetadata {
        &self.metadata
    }

    /// Builds the wire payload with the reserved keys merged into the values.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = self.values.clone();

        if let Some(location) = &self.gps_location {
            let location = match location {
                Some(location) => json!({
                    "latitude": location.latitude,
                    "longitude": location.longitude,
                    "accuracy": location.accuracy,
                    "timestamp": location.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                }),
                None => Value::Null,
            };
            payload.insert(GPS_LOCATION_KEY.to_owned(), location);
        }

        payload.insert(
            FORM_METADATA_KEY.to_owned(),
            json!({
                "form_name": self.metadata.form_name,
                "form_type": self.metadata.form_type,
                "submitted_at": self
                    .metadata
                    .submitted_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                "offline": self.metadata.offline,
            }),
        );

        Value::Object(payload)
    }
}
