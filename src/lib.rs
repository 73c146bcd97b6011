//! Ambient light calibration and display brightness/contrast engine.
//!
//! A raw light sensor reading is normalized through a [`calibration::Calibration`]
//! and mapped to a brightness/contrast pair by piece-wise linear
//! interpolation over a user-edited table of operating points.

pub mod calibration;
pub mod console;
pub mod curve;
pub mod panel;
pub mod persist;
pub mod sensor;
pub mod settings;
pub mod table;
pub mod units;
