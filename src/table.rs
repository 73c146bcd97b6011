//! Operating-point tables.
//!
//! A table exists in three shapes:
//!   - [`EditablePoint`] rows as the user is typing them (text allowed,
//!     ambient light in readable percent, any order, duplicates allowed)
//!   - [`StoredPoint`] rows as persisted (numbers or `null`, normalized
//!     ambient light, still unsorted and unfiltered)
//!   - [`OperatingPoint`] rows after [`sanitize`]: numeric, in range,
//!     unique ambient light, ascending

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::units::{self, Entry, MAX_READABLE_AMBIENT_LIGHT};

pub const MAX_BRIGHTNESS: f64 = 100.0;
pub const MAX_CONTRAST: f64 = 100.0;

pub const DUPLICATE_VALUE_MESSAGE: &str = "Duplicate value. Row will be ignored.";
pub const INVALID_VALUE_MESSAGE: &str = "Invalid value. Row will be ignored.";

/// One interpolation knot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingPoint {
    /// Normalized, 0.0 ..= 1.0.
    pub ambient_light: f64,
    /// Percent, 0 ..= 100.
    pub brightness: f64,
    /// Percent, 0 ..= 100.
    pub contrast: f64,
}

/// A persisted row. `None` is a field the user has not filled in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPoint {
    pub ambient_light: Option<f64>,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
}

impl StoredPoint {
    /// The numeric point, if every field is present and a number.
    pub fn to_operating_point(&self) -> Option<OperatingPoint> {
        let ambient_light = self.ambient_light.filter(|v| !v.is_nan())?;
        let brightness = self.brightness.filter(|v| !v.is_nan())?;
        let contrast = self.contrast.filter(|v| !v.is_nan())?;
        Some(OperatingPoint {
            ambient_light,
            brightness,
            contrast,
        })
    }
}

impl From<OperatingPoint> for StoredPoint {
    fn from(point: OperatingPoint) -> Self {
        Self {
            ambient_light: Some(point.ambient_light),
            brightness: Some(point.brightness),
            contrast: Some(point.contrast),
        }
    }
}

/// Non-finite values cannot be written as JSON numbers; they persist as `null`.
fn finite_or_null(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Which column of a row an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointField {
    AmbientLight,
    Brightness,
    Contrast,
}

/// A row as the user is editing it. Ambient light is in readable percent.
#[derive(Debug, Clone, PartialEq)]
pub struct EditablePoint {
    pub ambient_light: Entry,
    pub brightness: Entry,
    pub contrast: Entry,
}

impl EditablePoint {
    pub fn from_stored(point: &StoredPoint) -> Self {
        Self {
            ambient_light: Entry::from_optional(point.ambient_light.map(units::normalized_to_readable)),
            brightness: Entry::from_optional(point.brightness),
            contrast: Entry::from_optional(point.contrast),
        }
    }

    /// Coerce and normalize, without filtering anything out.
    pub fn to_stored(&self) -> StoredPoint {
        StoredPoint {
            ambient_light: finite_or_null(units::readable_to_normalized(
                self.ambient_light.to_number(),
            )),
            brightness: finite_or_null(self.brightness.to_number()),
            contrast: finite_or_null(self.contrast.to_number()),
        }
    }

    pub fn field(&self, field: PointField) -> &Entry {
        match field {
            PointField::AmbientLight => &self.ambient_light,
            PointField::Brightness => &self.brightness,
            PointField::Contrast => &self.contrast,
        }
    }

    pub fn set(&mut self, field: PointField, value: Entry) {
        match field {
            PointField::AmbientLight => self.ambient_light = value,
            PointField::Brightness => self.brightness = value,
            PointField::Contrast => self.contrast = value,
        }
    }
}

/// Running set of ambient-light values seen so far in a traversal.
///
/// Equality is numeric, so `0.0` and `-0.0` collide. NaN is never "seen".
#[derive(Debug, Default)]
pub struct SeenValues {
    values: HashSet<u64>,
}

impl SeenValues {
    /// Record `value`, returning true when it had already been recorded.
    pub fn observe(&mut self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let key = if value == 0.0 { 0 } else { value.to_bits() };
        !self.values.insert(key)
    }
}

/// Pair every item with whether its key appeared earlier in the sequence.
///
/// One pass; the first occurrence of a value is never marked.
pub fn mark_seen<T, I, F>(items: I, key: F) -> Vec<(T, bool)>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> f64,
{
    items
        .into_iter()
        .scan(SeenValues::default(), |seen, item| {
            let was_seen = seen.observe(key(&item));
            Some((item, was_seen))
        })
        .collect()
}

/// Build the table used for interpolation from stored rows.
///
/// Rows with a missing or non-numeric field are dropped, then later rows
/// repeating an earlier ambient light, then rows outside `[0, 1]`. The
/// survivors are sorted ascending (stable).
pub fn sanitize(points: &[StoredPoint]) -> Vec<OperatingPoint> {
    let numeric = points.iter().filter_map(StoredPoint::to_operating_point);

    let mut table: Vec<OperatingPoint> = mark_seen(numeric, |p| p.ambient_light)
        .into_iter()
        .filter(|(point, seen)| !seen && (0.0..=1.0).contains(&point.ambient_light))
        .map(|(point, _)| point)
        .collect();

    table.sort_by(|a, b| a.ambient_light.total_cmp(&b.ambient_light));
    table
}

fn compare_rows(a: &EditablePoint, b: &EditablePoint) -> Ordering {
    let a_light = a.ambient_light.to_number();
    let b_light = b.ambient_light.to_number();
    match (a_light.is_nan(), b_light.is_nan()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => Ordering::Equal,
        (false, false) => a_light.total_cmp(&b_light),
    }
}

/// The "Sort Rows" action: reorder editable rows by ambient light.
///
/// Rows without a numeric ambient light go first. Nothing is dropped.
pub fn sort_rows(rows: &[EditablePoint]) -> Vec<EditablePoint> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(compare_rows);
    sorted
}

/// Per-field annotation for the table view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Valid,
    Invalid,
    Duplicate,
}

impl FieldStatus {
    pub fn message(self) -> Option<&'static str> {
        match self {
            FieldStatus::Valid => None,
            FieldStatus::Invalid => Some(INVALID_VALUE_MESSAGE),
            FieldStatus::Duplicate => Some(DUPLICATE_VALUE_MESSAGE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStatus {
    pub ambient_light: FieldStatus,
    pub brightness: FieldStatus,
    pub contrast: FieldStatus,
}

impl RowStatus {
    /// A row is flagged as soon as any of its fields is.
    pub fn is_valid(&self) -> bool {
        self.ambient_light == FieldStatus::Valid
            && self.brightness == FieldStatus::Valid
            && self.contrast == FieldStatus::Valid
    }
}

fn range_status(value: &Entry, max: f64) -> FieldStatus {
    if units::is_valid_and_in_bounds(value, 0.0, max) {
        FieldStatus::Valid
    } else {
        FieldStatus::Invalid
    }
}

/// Annotate editable rows, in order, for inline error display.
pub fn row_statuses(rows: &[EditablePoint]) -> Vec<RowStatus> {
    mark_seen(rows, |row| row.ambient_light.to_number())
        .into_iter()
        .map(|(row, seen)| {
            let ambient_light = match range_status(&row.ambient_light, MAX_READABLE_AMBIENT_LIGHT) {
                FieldStatus::Valid if seen => FieldStatus::Duplicate,
                status => status,
            };
            RowStatus {
                ambient_light,
                brightness: range_status(&row.brightness, MAX_BRIGHTNESS),
                contrast: range_status(&row.contrast, MAX_CONTRAST),
            }
        })
        .collect()
}
