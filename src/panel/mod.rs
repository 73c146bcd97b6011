//! Display panel controller.
//!
//! Owns the combined settings views and the latest raw sample. Every user
//! edit goes through [`DisplayPanel::execute`], which returns the side
//! effects for the caller to apply (pushing the stored record), so the
//! controller itself stays free of I/O.

pub mod state;

use tracing::info;

use crate::calibration::Calibration;
use crate::curve;
use crate::persist::PersistOutcome;
use crate::settings::{CombinedSettings, DisplaySettings, EditableSettings};
use crate::table::{self, EditablePoint, PointField, RowStatus};
use crate::units::{self, Entry};

use self::state::StateSnapshot;

pub const NO_LIGHT_SENSOR_DATA_ERROR: &str = "Light sensor data not received.";
pub const INVALID_SETTINGS_ERROR: &str = "Invalid configuration";
pub const NOT_CALIBRATED_MESSAGE: &str = "The light sensor has not been calibrated.";

#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    StartEditing,
    /// Leave edit mode, normalizing the sleep fields.
    StopEditing,
    /// Append a row seeded with the current ambient light.
    AddRow,
    DeleteRow(usize),
    UpdateRow(usize, PointField, Entry),
    SortRows,
    SetSleepDuration(Entry),
    /// Readable percent.
    SetSleepThreshold(Entry),
    SetCalibration(Calibration),
}

/// Side effects produced by executing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelEffect {
    /// The stored record changed and should be pushed to the settings store.
    pub persist: bool,
}

impl PanelEffect {
    fn none() -> Self {
        Self { persist: false }
    }

    fn persist() -> Self {
        Self { persist: true }
    }
}

/// What the display section shows for the live values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    NotCalibrated,
    NoSensorData,
    /// Sampling, but the table has no usable rows.
    InvalidConfiguration { ambient_light: f64 },
    Active {
        ambient_light: f64,
        brightness: f64,
        contrast: f64,
    },
}

impl Reading {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Reading::NotCalibrated => Some(NOT_CALIBRATED_MESSAGE),
            Reading::NoSensorData => Some(NO_LIGHT_SENSOR_DATA_ERROR),
            Reading::InvalidConfiguration { .. } => Some(INVALID_SETTINGS_ERROR),
            Reading::Active { .. } => None,
        }
    }
}

pub struct DisplayPanel {
    settings: CombinedSettings,
    editing: bool,
    raw_ambient: Option<u32>,
    persist_error: Option<String>,
}

impl DisplayPanel {
    pub fn new(stored: DisplaySettings) -> Self {
        Self {
            settings: CombinedSettings::from_stored(stored),
            editing: false,
            raw_ambient: None,
            persist_error: None,
        }
    }

    pub fn settings(&self) -> &CombinedSettings {
        &self.settings
    }

    /// The record to hand to the settings store.
    pub fn stored(&self) -> &DisplaySettings {
        &self.settings.stored
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn raw_ambient(&self) -> Option<u32> {
        self.raw_ambient
    }

    pub fn set_raw_ambient(&mut self, raw: Option<u32>) {
        self.raw_ambient = raw;
    }

    /// Normalized ambient light, `None` without a sample or a calibration.
    pub fn normalized_ambient(&self) -> Option<f64> {
        let calibration = self.settings.editable.calibration?;
        let raw = self.raw_ambient?;
        Some(units::raw_to_normalized(raw as f64, &calibration))
    }

    pub fn reading(&self) -> Reading {
        if self.settings.editable.calibration.is_none() {
            return Reading::NotCalibrated;
        }
        let Some(ambient_light) = self.normalized_ambient() else {
            return Reading::NoSensorData;
        };
        match curve::compute_brightness_contrast(
            Some(ambient_light),
            &self.settings.sanitized.config_values,
        ) {
            Some(point) => Reading::Active {
                ambient_light,
                brightness: point.brightness,
                contrast: point.contrast,
            },
            None => Reading::InvalidConfiguration { ambient_light },
        }
    }

    pub fn row_statuses(&self) -> Vec<RowStatus> {
        table::row_statuses(&self.settings.editable.config_values)
    }

    /// Record the result of a settings push. The in-memory state is kept
    /// either way.
    pub fn apply_persist_outcome(&mut self, outcome: PersistOutcome) {
        self.persist_error = match outcome {
            PersistOutcome::Saved => None,
            PersistOutcome::Failed(message) => Some(message),
        };
    }

    pub fn persist_error(&self) -> Option<&str> {
        self.persist_error.as_deref()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let reading = self.reading();
        let (ambient_light, brightness, contrast) = match reading {
            Reading::Active {
                ambient_light,
                brightness,
                contrast,
            } => (Some(ambient_light), Some(brightness), Some(contrast)),
            Reading::InvalidConfiguration { ambient_light } => (Some(ambient_light), None, None),
            Reading::NotCalibrated | Reading::NoSensorData => (None, None, None),
        };
        let statuses = self.row_statuses();
        StateSnapshot {
            calibrated: self.settings.editable.calibration.is_some(),
            raw_ambient_light: self.raw_ambient,
            ambient_light: ambient_light.map(units::normalized_to_readable),
            brightness,
            contrast,
            message: reading.message(),
            editing: self.editing,
            rows: statuses.len(),
            flagged_rows: statuses.iter().filter(|s| !s.is_valid()).count(),
            persist_error: self.persist_error.clone(),
        }
    }

    /// Execute a panel command. Returns the side effects to apply.
    pub fn execute(&mut self, cmd: PanelCommand) -> PanelEffect {
        match cmd {
            PanelCommand::StartEditing => self.start_editing(),
            PanelCommand::StopEditing => self.stop_editing(),
            PanelCommand::AddRow => self.add_row(),
            PanelCommand::DeleteRow(index) => self.delete_row(index),
            PanelCommand::UpdateRow(index, field, value) => self.update_row(index, field, value),
            PanelCommand::SortRows => self.sort_rows(),
            PanelCommand::SetSleepDuration(value) => self.set_sleep_duration(value),
            PanelCommand::SetSleepThreshold(value) => self.set_sleep_threshold(value),
            PanelCommand::SetCalibration(calibration) => self.set_calibration(calibration),
        }
    }

    fn update(&mut self, editable: EditableSettings) {
        self.settings = self.settings.with_editable(editable);
    }

    fn start_editing(&mut self) -> PanelEffect {
        self.editing = true;
        PanelEffect::none()
    }

    fn stop_editing(&mut self) -> PanelEffect {
        let current = &self.settings.stored.sleep;
        let mut editable = self.settings.editable.clone();
        editable.sleep.duration =
            Entry::Number(units::to_number(&editable.sleep.duration, current.duration));
        editable.sleep.threshold = Entry::Number(units::to_number(
            &editable.sleep.threshold,
            units::normalized_to_readable(current.threshold),
        ));
        self.update(editable);
        self.editing = false;
        PanelEffect::none()
    }

    fn add_row(&mut self) -> PanelEffect {
        let seed = units::format_readable(self.normalized_ambient().unwrap_or(0.0));
        let mut editable = self.settings.editable.clone();
        editable.config_values.push(EditablePoint {
            ambient_light: Entry::Text(seed),
            brightness: Entry::Number(0.0),
            contrast: Entry::Number(0.0),
        });
        self.update(editable);
        PanelEffect::persist()
    }

    fn delete_row(&mut self, index: usize) -> PanelEffect {
        let rows = &self.settings.editable.config_values;
        // The last remaining row cannot be deleted
        if rows.len() <= 1 || index >= rows.len() {
            return PanelEffect::none();
        }
        let mut editable = self.settings.editable.clone();
        editable.config_values.remove(index);
        self.update(editable);
        info!("[DISPLAY] Deleted row {index}");
        PanelEffect::persist()
    }

    fn update_row(&mut self, index: usize, field: PointField, value: Entry) -> PanelEffect {
        if index >= self.settings.editable.config_values.len() {
            return PanelEffect::none();
        }
        let mut editable = self.settings.editable.clone();
        editable.config_values[index].set(field, value);
        self.update(editable);
        PanelEffect::persist()
    }

    fn sort_rows(&mut self) -> PanelEffect {
        let mut editable = self.settings.editable.clone();
        editable.config_values = table::sort_rows(&editable.config_values);
        self.update(editable);
        PanelEffect::persist()
    }

    fn set_sleep_duration(&mut self, value: Entry) -> PanelEffect {
        let mut editable = self.settings.editable.clone();
        editable.sleep.duration = value;
        self.update(editable);
        PanelEffect::persist()
    }

    fn set_sleep_threshold(&mut self, value: Entry) -> PanelEffect {
        let mut editable = self.settings.editable.clone();
        editable.sleep.threshold = value;
        self.update(editable);
        PanelEffect::persist()
    }

    fn set_calibration(&mut self, calibration: Calibration) -> PanelEffect {
        let mut editable = self.settings.editable.clone();
        editable.calibration = Some(calibration);
        self.update(editable);
        info!(
            "[DISPLAY] Calibration set: min={} max={}",
            calibration.min, calibration.max
        );
        PanelEffect::persist()
    }
}
