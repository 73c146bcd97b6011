//! Display settings in their three shapes.
//!
//! - [`EditableSettings`]: what the user is typing. Text allowed, rows
//!   unsorted, ambient light and sleep threshold in readable percent.
//! - [`DisplaySettings`]: the persisted record. Numbers or `null` only, but
//!   still unsorted and unfiltered so unfinished edits survive a reload.
//! - [`SanitizedSettings`]: what the graph and the brightness/contrast
//!   computation read. Sorted, deduplicated, in range.
//!
//! [`CombinedSettings`] keeps the three in step; the stored and sanitized
//! views are always recomputed from the editable one, never edited directly.

pub mod store;

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::table::{self, EditablePoint, OperatingPoint, StoredPoint};
use crate::units::{self, Entry};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepSettings {
    /// Minutes below the threshold before the display sleeps.
    pub duration: f64,
    /// Normalized ambient light level.
    pub threshold: f64,
}

/// The persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub sleep: SleepSettings,
    /// `None` until the sensor has been calibrated.
    pub calibration: Option<Calibration>,
    pub config_values: Vec<StoredPoint>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            sleep: SleepSettings {
                duration: 5.0,
                threshold: 0.1,
            },
            calibration: None,
            config_values: vec![StoredPoint {
                ambient_light: Some(0.0),
                brightness: Some(50.0),
                contrast: Some(50.0),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditableSleep {
    pub duration: Entry,
    /// Readable percent.
    pub threshold: Entry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditableSettings {
    pub sleep: EditableSleep,
    pub calibration: Option<Calibration>,
    pub config_values: Vec<EditablePoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedSettings {
    pub sleep: SleepSettings,
    pub calibration: Option<Calibration>,
    pub config_values: Vec<OperatingPoint>,
}

/// Initial editable view of a stored record. Rows come back sorted.
pub fn to_editable(settings: &DisplaySettings) -> EditableSettings {
    let rows: Vec<EditablePoint> = settings
        .config_values
        .iter()
        .map(EditablePoint::from_stored)
        .collect();

    EditableSettings {
        sleep: EditableSleep {
            duration: Entry::Number(settings.sleep.duration),
            threshold: Entry::Number(units::normalized_to_readable(settings.sleep.threshold)),
        },
        calibration: settings.calibration,
        config_values: table::sort_rows(&rows),
    }
}

/// Stored record for an editable view.
///
/// Sleep fields that do not parse keep the value from `current`. Rows are
/// coerced and normalized but not filtered.
pub fn to_stored(editable: &EditableSettings, current: &DisplaySettings) -> DisplaySettings {
    let duration = units::to_number(&editable.sleep.duration, current.sleep.duration);
    let threshold = units::readable_to_normalized(units::to_number(
        &editable.sleep.threshold,
        units::normalized_to_readable(current.sleep.threshold),
    ));

    DisplaySettings {
        sleep: SleepSettings {
            duration,
            threshold,
        },
        calibration: editable.calibration,
        config_values: editable
            .config_values
            .iter()
            .map(EditablePoint::to_stored)
            .collect(),
    }
}

pub fn sanitize_settings(settings: &DisplaySettings) -> SanitizedSettings {
    SanitizedSettings {
        sleep: settings.sleep,
        calibration: settings.calibration,
        config_values: table::sanitize(&settings.config_values),
    }
}

/// The editable, stored and sanitized views of one settings record.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSettings {
    pub editable: EditableSettings,
    pub stored: DisplaySettings,
    pub sanitized: SanitizedSettings,
}

impl CombinedSettings {
    pub fn from_stored(stored: DisplaySettings) -> Self {
        Self {
            editable: to_editable(&stored),
            sanitized: sanitize_settings(&stored),
            stored,
        }
    }

    /// Replace the editable view and recompute the other two from it.
    pub fn with_editable(&self, editable: EditableSettings) -> Self {
        let stored = to_stored(&editable, &self.stored);
        let sanitized = sanitize_settings(&stored);
        Self {
            editable,
            stored,
            sanitized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_settings() -> DisplaySettings {
        DisplaySettings {
            sleep: SleepSettings {
                duration: 10.0,
                threshold: 0.25,
            },
            calibration: Some(Calibration {
                min: 10.0,
                max: 1000.0,
            }),
            config_values: vec![
                StoredPoint {
                    ambient_light: Some(0.75),
                    brightness: Some(90.0),
                    contrast: Some(95.0),
                },
                StoredPoint {
                    ambient_light: None,
                    brightness: Some(1.0),
                    contrast: Some(1.0),
                },
                StoredPoint {
                    ambient_light: Some(0.25),
                    brightness: Some(10.0),
                    contrast: Some(20.0),
                },
            ],
        }
    }

    #[test]
    fn test_to_editable_sorts_and_converts() {
        let editable = to_editable(&sample_settings());
        assert_eq!(editable.sleep.threshold, Entry::Number(25.0));
        let lights: Vec<String> = editable
            .config_values
            .iter()
            .map(|r| r.ambient_light.to_string())
            .collect();
        assert_eq!(lights, vec!["", "25", "75"]);
    }

    #[test]
    fn test_to_stored_falls_back_for_bad_sleep_entries() {
        let current = sample_settings();
        let mut editable = to_editable(&current);
        editable.sleep.duration = Entry::empty();
        editable.sleep.threshold = Entry::from("50");
        let stored = to_stored(&editable, &current);
        assert_eq!(stored.sleep.duration, 10.0);
        assert_eq!(stored.sleep.threshold, 0.5);
    }

    #[test]
    fn test_invalid_rows_persist_but_are_not_sanitized() {
        let combined = CombinedSettings::from_stored(sample_settings());
        let mut editable = combined.editable.clone();
        editable.config_values[1].brightness = Entry::from("");
        let updated = combined.with_editable(editable);

        assert_eq!(updated.stored.config_values.len(), 3);
        assert_eq!(updated.stored.config_values[1].brightness, None);
        assert_eq!(updated.sanitized.config_values.len(), 1);
        assert_eq!(updated.sanitized.config_values[0].ambient_light, 0.75);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample_settings()).unwrap();
        assert_eq!(json["sleep"]["threshold"], 0.25);
        assert_eq!(json["calibration"]["max"], 1000.0);
        assert_eq!(json["configValues"][0]["ambientLight"], 0.75);
        assert!(json["configValues"][1]["ambientLight"].is_null());

        let back: DisplaySettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_settings());
    }

    #[test]
    fn test_uncalibrated_record_parses() {
        let json = r#"{"sleep":{"duration":1,"threshold":0},"calibration":null,"configValues":[]}"#;
        let settings: DisplaySettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.calibration, None);
        assert!(sanitize_settings(&settings).config_values.is_empty());
    }
}
