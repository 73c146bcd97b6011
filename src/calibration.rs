//! Ambient light sensor calibration.
//!
//! A [`Calibration`] is the pair of raw sensor bounds mapped to 0% and 100%.
//! A [`CalibrationSession`] captures those bounds from live samples: while
//! calibrating, the lowest and highest readings seen become the working
//! bounds, which the user can then commit or edit by hand.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::units::{Entry, MAX_RAW_AMBIENT_LIGHT};

/// Samples kept for the live preview graph.
pub const HISTORY_MAX_LENGTH: usize = 50;

pub const MAX_NOT_ABOVE_MIN_MESSAGE: &str = "The max value must be greater than the min.";

/// Raw sensor bounds. Valid once committed: `0 <= min < max <= 2^32-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    NotANumber,
    OutOfRange,
    NotAboveMin,
}

impl FieldError {
    pub fn message(self) -> &'static str {
        match self {
            FieldError::NotANumber => "Not a number.",
            FieldError::OutOfRange => "Must be between 0 and 4,294,967,295.",
            FieldError::NotAboveMin => MAX_NOT_ABOVE_MIN_MESSAGE,
        }
    }
}

/// Validation result for the min and max fields, reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldErrors {
    pub min: Option<FieldError>,
    pub max: Option<FieldError>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn max_not_above_min(&self) -> bool {
        self.min == Some(FieldError::NotAboveMin) || self.max == Some(FieldError::NotAboveMin)
    }
}

fn in_sensor_range(value: f64) -> bool {
    (0.0..=MAX_RAW_AMBIENT_LIGHT as f64).contains(&value)
}

fn field_error(value: f64, max_not_above_min: bool) -> Option<FieldError> {
    if value.is_nan() {
        Some(FieldError::NotANumber)
    } else if !in_sensor_range(value) {
        Some(FieldError::OutOfRange)
    } else if max_not_above_min {
        Some(FieldError::NotAboveMin)
    } else {
        None
    }
}

/// Check candidate bounds. Both must be numbers in sensor range and `max > min`.
pub fn validate(min: f64, max: f64) -> Result<Calibration, FieldErrors> {
    let max_not_above_min = max <= min;
    let errors = FieldErrors {
        min: field_error(min, max_not_above_min),
        max: field_error(max, max_not_above_min),
    };
    if errors.is_empty() {
        Ok(Calibration { min, max })
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Fields are editable and show either the committed bounds or the
    /// result of the last calibration run.
    Idle { min: Entry, max: Entry },
    /// Folding live samples into the working bounds. `None` is unset.
    Calibrating { min: Option<u32>, max: Option<u32> },
}

/// What to tell the user about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Calibrating,
    NoSensorData,
    CalibrationUpdated,
    Idle,
}

pub struct CalibrationSession {
    committed: Option<Calibration>,
    state: SessionState,
    history: VecDeque<Option<u32>>,
}

fn idle_fields(committed: Option<Calibration>) -> SessionState {
    match committed {
        Some(c) => SessionState::Idle {
            min: Entry::Number(c.min),
            max: Entry::Number(c.max),
        },
        None => SessionState::Idle {
            min: Entry::empty(),
            max: Entry::empty(),
        },
    }
}

impl CalibrationSession {
    pub fn new(committed: Option<Calibration>, first_sample: Option<u32>) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_MAX_LENGTH);
        history.push_back(first_sample);
        Self {
            committed,
            state: idle_fields(committed),
            history,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn committed(&self) -> Option<Calibration> {
        self.committed
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.state, SessionState::Calibrating { .. })
    }

    /// Recent samples, oldest first. `None` entries are ticks with no data.
    pub fn history(&self) -> impl Iterator<Item = Option<u32>> + '_ {
        self.history.iter().copied()
    }

    pub fn receiving_sensor_data(&self) -> bool {
        self.history.iter().any(Option::is_some)
    }

    /// Feed one poll result.
    pub fn tick(&mut self, sample: Option<u32>) {
        if let (SessionState::Calibrating { min, max }, Some(value)) = (&mut self.state, sample) {
            if min.map_or(true, |m| value < m) {
                *min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                *max = Some(value);
            }
        }

        if self.history.len() >= HISTORY_MAX_LENGTH {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    /// Begin capturing bounds. Refused without sensor data or when already running.
    pub fn start(&mut self) -> bool {
        if self.is_calibrating() || !self.receiving_sensor_data() {
            return false;
        }
        self.state = SessionState::Calibrating {
            min: None,
            max: None,
        };
        info!("[CAL] Calibration started");
        true
    }

    /// Stop capturing; the working bounds become the editable fields.
    pub fn stop(&mut self) {
        if let SessionState::Calibrating { min, max } = self.state {
            info!("[CAL] Calibration stopped: min={min:?} max={max:?}");
            self.state = SessionState::Idle {
                min: Entry::from_optional(min.map(f64::from)),
                max: Entry::from_optional(max.map(f64::from)),
            };
        }
    }

    /// Manual entry of the lower bound. Refused while calibrating.
    pub fn set_min(&mut self, value: Entry) -> bool {
        match &mut self.state {
            SessionState::Idle { min, .. } => {
                *min = value;
                true
            }
            SessionState::Calibrating { .. } => false,
        }
    }

    /// Manual entry of the upper bound. Refused while calibrating.
    pub fn set_max(&mut self, value: Entry) -> bool {
        match &mut self.state {
            SessionState::Idle { max, .. } => {
                *max = value;
                true
            }
            SessionState::Calibrating { .. } => false,
        }
    }

    /// Current bounds as numbers, NaN when unset or not parseable.
    pub fn working_bounds(&self) -> (f64, f64) {
        match &self.state {
            SessionState::Idle { min, max } => (min.to_number(), max.to_number()),
            SessionState::Calibrating { min, max } => (
                min.map_or(f64::NAN, f64::from),
                max.map_or(f64::NAN, f64::from),
            ),
        }
    }

    /// Errors to display next to the fields. `None` while calibrating, since
    /// the bounds are still moving.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        if self.is_calibrating() {
            return None;
        }
        let (min, max) = self.working_bounds();
        Some(validate(min, max).err().unwrap_or_default())
    }

    pub fn ready_to_commit(&self) -> bool {
        if self.is_calibrating() {
            return false;
        }
        let (min, max) = self.working_bounds();
        match validate(min, max) {
            Ok(calibration) => self.committed != Some(calibration),
            Err(_) => false,
        }
    }

    /// Stop any active run and commit the bounds if they are valid and new.
    pub fn commit(&mut self) -> Option<Calibration> {
        self.stop();
        if !self.ready_to_commit() {
            debug!("[CAL] Nothing to commit");
            return None;
        }
        let (min, max) = self.working_bounds();
        let calibration = validate(min, max).ok()?;
        self.committed = Some(calibration);
        self.state = idle_fields(self.committed);
        info!("[CAL] Committed calibration min={min} max={max}");
        Some(calibration)
    }

    /// Abandon the session's edits and return to the committed bounds.
    pub fn cancel(&mut self) {
        self.state = idle_fields(self.committed);
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_calibrating() {
            SessionStatus::Calibrating
        } else if !self.receiving_sensor_data() {
            SessionStatus::NoSensorData
        } else if self.ready_to_commit() {
            SessionStatus::CalibrationUpdated
        } else {
            SessionStatus::Idle
        }
    }
}
