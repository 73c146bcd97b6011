//! Light-level unit conversion and numeric coercion.
//!
//! Three representations of the same quantity:
//!   raw        sensor counts, 0 ..= 2^32-1
//!   normalized 0.0 ..= 1.0 through a [`Calibration`]
//!   readable   normalized * 100, what the user types and reads (percent)

use std::fmt;

use crate::calibration::Calibration;

pub const MAX_RAW_AMBIENT_LIGHT: u32 = u32::MAX;
pub const MAX_READABLE_AMBIENT_LIGHT: f64 = 100.0;
pub const AMBIENT_LIGHT_NUM_DECIMALS: usize = 2;
pub const AMBIENT_LIGHT_SUFFIX: &str = "%";

/// A user-entered field value: either a committed number or in-progress text.
///
/// The empty string means "not yet entered".
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Number(f64),
    Text(String),
}

impl Entry {
    pub fn empty() -> Self {
        Entry::Text(String::new())
    }

    /// `None` (a `null` in the stored record) becomes an empty entry.
    pub fn from_optional(value: Option<f64>) -> Self {
        match value {
            Some(v) => Entry::Number(v),
            None => Entry::empty(),
        }
    }

    /// Coerce to a number, NaN when the entry does not parse.
    pub fn to_number(&self) -> f64 {
        to_number(self, f64::NAN)
    }

    pub fn is_number(&self) -> bool {
        !self.to_number().is_nan()
    }
}

impl From<f64> for Entry {
    fn from(value: f64) -> Self {
        Entry::Number(value)
    }
}

impl From<&str> for Entry {
    fn from(value: &str) -> Self {
        Entry::Text(value.to_string())
    }
}

impl From<String> for Entry {
    fn from(value: String) -> Self {
        Entry::Text(value)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Number(n) => write!(f, "{n}"),
            Entry::Text(t) => f.write_str(t),
        }
    }
}

pub fn normalized_to_readable(normalized: f64) -> f64 {
    normalized * MAX_READABLE_AMBIENT_LIGHT
}

pub fn readable_to_normalized(readable: f64) -> f64 {
    readable / MAX_READABLE_AMBIENT_LIGHT
}

/// Readable percent with the display precision, e.g. `"42.50"`.
pub fn format_readable(normalized: f64) -> String {
    format!(
        "{:.*}",
        AMBIENT_LIGHT_NUM_DECIMALS,
        normalized_to_readable(normalized)
    )
}

/// Map a raw sensor value into `[0, 1]` using `calibration`.
///
/// Never fails: a degenerate calibration (`max <= min`) still yields a value
/// in range. `±inf` clamps by sign and `0/0` yields 0.
pub fn raw_to_normalized(raw: f64, calibration: &Calibration) -> f64 {
    let normalized = (raw - calibration.min) / (calibration.max - calibration.min);
    if normalized.is_nan() || normalized < 0.0 {
        return 0.0;
    }
    if normalized > 1.0 {
        return 1.0;
    }
    normalized
}

/// Inverse of [`raw_to_normalized`], rounded and clamped to the sensor range.
pub fn normalized_to_raw(normalized: f64, calibration: &Calibration) -> u32 {
    let raw = (normalized * (calibration.max - calibration.min) + calibration.min).round();
    if raw.is_nan() || raw < 0.0 {
        return 0;
    }
    if raw > MAX_RAW_AMBIENT_LIGHT as f64 {
        return MAX_RAW_AMBIENT_LIGHT;
    }
    raw as u32
}

/// Coerce an entry to a number, falling back to `default` when it does not parse.
pub fn to_number(value: &Entry, default: f64) -> f64 {
    let parsed = match value {
        Entry::Number(n) => *n,
        Entry::Text(text) => parse_number(text).unwrap_or(f64::NAN),
    };
    if parsed.is_nan() {
        default
    } else {
        parsed
    }
}

/// Parse the longest numeric prefix of `text`.
///
/// Accepts leading whitespace, an optional sign, digits with an optional
/// fraction and exponent, or `Infinity`. Trailing garbage is ignored, so
/// `"12%"` parses as 12.
pub fn parse_number(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let len = bytes.len();

    let mut end = 0;
    let mut negative = false;
    if let Some(&sign) = bytes.first() {
        if sign == b'+' || sign == b'-' {
            negative = sign == b'-';
            end = 1;
        }
    }

    if s[end..].starts_with("Infinity") {
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let int_start = end;
    while end < len && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < len && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < len && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < len && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < len && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < len && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// True when `value` parses to a number inside `min..=max`.
pub fn is_valid_and_in_bounds(value: &Entry, min: f64, max: f64) -> bool {
    let parsed = value.to_number();
    !parsed.is_nan() && parsed >= min && parsed <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal(min: f64, max: f64) -> Calibration {
        Calibration { min, max }
    }

    #[test]
    fn test_readable_round_trip() {
        assert_eq!(normalized_to_readable(0.25), 25.0);
        assert_eq!(readable_to_normalized(25.0), 0.25);
        // No clamping at this layer
        assert_eq!(normalized_to_readable(1.5), 150.0);
    }

    #[test]
    fn test_raw_to_normalized_bounds() {
        let c = cal(100.0, 1100.0);
        assert_eq!(raw_to_normalized(100.0, &c), 0.0);
        assert_eq!(raw_to_normalized(1100.0, &c), 1.0);
        assert_eq!(raw_to_normalized(600.0, &c), 0.5);
        assert_eq!(raw_to_normalized(0.0, &c), 0.0);
        assert_eq!(raw_to_normalized(u32::MAX as f64, &c), 1.0);
    }

    #[test]
    fn test_raw_to_normalized_stays_in_unit_range() {
        let c = cal(1_000.0, 250_000.0);
        for raw in (0..300_000u32).step_by(997) {
            let n = raw_to_normalized(raw as f64, &c);
            assert!((0.0..=1.0).contains(&n), "raw {raw} gave {n}");
        }
    }

    #[test]
    fn test_degenerate_calibration_clamps() {
        let c = cal(50.0, 50.0);
        assert_eq!(raw_to_normalized(10.0, &c), 0.0);
        assert_eq!(raw_to_normalized(90.0, &c), 1.0);
        assert_eq!(raw_to_normalized(50.0, &c), 0.0);

        let inverted = cal(90.0, 10.0);
        let n = raw_to_normalized(50.0, &inverted);
        assert!((0.0..=1.0).contains(&n));
    }

    #[test]
    fn test_normalized_to_raw_round_trip() {
        let c = cal(100.0, 1100.0);
        for raw in [101u32, 350, 777, 1099] {
            let back = normalized_to_raw(raw_to_normalized(raw as f64, &c), &c);
            assert!(back.abs_diff(raw) <= 1, "{raw} came back as {back}");
        }
    }

    #[test]
    fn test_normalized_to_raw_clamps() {
        let c = cal(0.0, MAX_RAW_AMBIENT_LIGHT as f64);
        assert_eq!(normalized_to_raw(2.0, &c), MAX_RAW_AMBIENT_LIGHT);
        assert_eq!(normalized_to_raw(-1.0, &c), 0);
        assert_eq!(normalized_to_raw(f64::NAN, &c), 0);
    }

    #[test]
    fn test_parse_number_prefixes() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("  -3.5"), Some(-3.5));
        assert_eq!(parse_number("12%"), Some(12.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("5."), Some(5.0));
        assert_eq!(parse_number("1e3x"), Some(1000.0));
        assert_eq!(parse_number("2e"), Some(2.0));
        assert_eq!(parse_number("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn test_to_number_defaults() {
        assert_eq!(to_number(&Entry::from("7"), 0.0), 7.0);
        assert_eq!(to_number(&Entry::empty(), 3.0), 3.0);
        assert_eq!(to_number(&Entry::Number(f64::NAN), 9.0), 9.0);
        assert!(Entry::from("nope").to_number().is_nan());
    }

    #[test]
    fn test_is_valid_and_in_bounds() {
        assert!(is_valid_and_in_bounds(&Entry::from("0"), 0.0, 100.0));
        assert!(is_valid_and_in_bounds(&Entry::Number(100.0), 0.0, 100.0));
        assert!(!is_valid_and_in_bounds(&Entry::Number(100.5), 0.0, 100.0));
        assert!(!is_valid_and_in_bounds(&Entry::empty(), 0.0, 100.0));
    }

    #[test]
    fn test_format_readable() {
        assert_eq!(format_readable(0.425), "42.50");
        assert_eq!(format_readable(0.0), "0.00");
    }
}
