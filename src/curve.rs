//! Piece-wise linear brightness/contrast curve.

use crate::table::OperatingPoint;

/// Evaluate the line through `p1` and `p2` at `x`, rounded to an integer.
fn interpolate(p1: (f64, f64), p2: (f64, f64), x: f64) -> f64 {
    let slope = (p2.1 - p1.1) / (p2.0 - p1.0);
    (slope * (x - p1.0) + p1.1).round()
}

/// Brightness and contrast for a normalized ambient light level.
///
/// `table` must be sanitized (ascending, unique ambient light). Returns
/// `None` when there is no sample or no configuration. Outside the
/// configured range the nearest end point is returned unchanged; there is
/// no extrapolation.
pub fn compute_brightness_contrast(
    ambient_light: Option<f64>,
    table: &[OperatingPoint],
) -> Option<OperatingPoint> {
    let ambient_light = ambient_light?;
    let first = table.first()?;
    let last = table.last()?;

    if ambient_light <= first.ambient_light {
        return Some(*first);
    }
    if ambient_light >= last.ambient_light {
        return Some(*last);
    }

    // Leftmost index whose ambient light is >= the sample; never 0 or len here.
    let right_index = table.partition_point(|p| p.ambient_light < ambient_light);
    let right = table[right_index];
    let left = table[right_index - 1];

    Some(OperatingPoint {
        ambient_light,
        brightness: interpolate(
            (left.ambient_light, left.brightness),
            (right.ambient_light, right.brightness),
            ambient_light,
        ),
        contrast: interpolate(
            (left.ambient_light, left.contrast),
            (right.ambient_light, right.contrast),
            ambient_light,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(ambient_light: f64, brightness: f64, contrast: f64) -> OperatingPoint {
        OperatingPoint {
            ambient_light,
            brightness,
            contrast,
        }
    }

    fn two_point_table() -> Vec<OperatingPoint> {
        vec![point(0.2, 10.0, 20.0), point(0.8, 90.0, 95.0)]
    }

    #[test]
    fn test_no_sample_or_no_table() {
        assert_eq!(compute_brightness_contrast(None, &two_point_table()), None);
        assert_eq!(compute_brightness_contrast(Some(0.5), &[]), None);
    }

    #[test]
    fn test_exact_at_endpoints() {
        let table = two_point_table();
        assert_eq!(compute_brightness_contrast(Some(0.2), &table), Some(table[0]));
        assert_eq!(compute_brightness_contrast(Some(0.8), &table), Some(table[1]));
    }

    #[test]
    fn test_clamps_outside_range() {
        let table = two_point_table();
        assert_eq!(compute_brightness_contrast(Some(0.1), &table), Some(table[0]));
        assert_eq!(compute_brightness_contrast(Some(0.9), &table), Some(table[1]));
        assert_eq!(compute_brightness_contrast(Some(0.0), &table), Some(table[0]));
        assert_eq!(compute_brightness_contrast(Some(1.0), &table), Some(table[1]));
    }

    #[test]
    fn test_midpoint() {
        let result = compute_brightness_contrast(Some(0.5), &two_point_table()).unwrap();
        assert_eq!(result.ambient_light, 0.5);
        assert_eq!(result.brightness, 50.0);
        // 57.5 in exact arithmetic; the float evaluation lands just below it
        assert!(
            (57.0..=58.0).contains(&result.contrast),
            "contrast was {}",
            result.contrast
        );
        assert_eq!(result.contrast.fract(), 0.0);
    }

    #[test]
    fn test_single_point_table() {
        let table = vec![point(0.5, 42.0, 43.0)];
        for x in [0.0, 0.5, 1.0] {
            assert_eq!(compute_brightness_contrast(Some(x), &table), Some(table[0]));
        }
    }

    #[test]
    fn test_v_shaped_curve_is_honored() {
        let table = vec![point(0.0, 100.0, 50.0), point(0.5, 0.0, 50.0), point(1.0, 100.0, 50.0)];
        assert_eq!(
            compute_brightness_contrast(Some(0.25), &table).unwrap().brightness,
            50.0
        );
        assert_eq!(
            compute_brightness_contrast(Some(0.75), &table).unwrap().brightness,
            50.0
        );
        assert_eq!(
            compute_brightness_contrast(Some(0.5), &table).unwrap().brightness,
            0.0
        );
    }

    #[test]
    fn test_multi_segment() {
        let table = vec![
            point(0.0, 0.0, 0.0),
            point(0.1, 20.0, 10.0),
            point(0.15, 50.0, 10.0),
            point(0.25, 100.0, 30.0),
        ];
        let at = |x: f64| compute_brightness_contrast(Some(x), &table).unwrap();
        assert_eq!(at(0.05).brightness, 10.0);
        assert_eq!(at(0.125).brightness, 35.0);
        assert_eq!(at(0.2).brightness, 75.0);
        assert_eq!(at(0.2).contrast, 20.0);
        assert_eq!(at(0.3).brightness, 100.0);
    }
}
