//! Line commands for the interactive display console.
//!
//! ```text
//! edit | done | add | sort | show | quit
//! delete <row>
//! set <row> <light|brightness|contrast> [value]
//! duration [minutes]
//! threshold [percent]
//! calibration <min> <max>
//! ```
//!
//! Omitting a value enters an empty field, the same as clearing an input.

use tracing::{info, warn};

use crate::calibration::{Calibration, CalibrationSession};
use crate::panel::PanelCommand;
use crate::table::PointField;
use crate::units::Entry;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(PanelCommand),
    Show,
    Quit,
}

fn parse_field(name: &str) -> Option<PointField> {
    match name {
        "light" | "ambient" | "ambient-light" => Some(PointField::AmbientLight),
        "brightness" => Some(PointField::Brightness),
        "contrast" => Some(PointField::Contrast),
        _ => None,
    }
}

fn parse_index(word: Option<&str>) -> Option<usize> {
    let word = word?;
    match word.parse() {
        Ok(index) => Some(index),
        Err(_) => {
            warn!("[CONSOLE] Bad row number: {word}");
            None
        }
    }
}

fn rest<'a>(words: impl Iterator<Item = &'a str>) -> Entry {
    Entry::Text(words.collect::<Vec<_>>().join(" "))
}

/// Parse one console line. `committed` is the calibration currently in
/// effect; re-entering it produces no command.
pub fn parse_console_line(line: &str, committed: Option<Calibration>) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace();
    let cmd = words.next()?.to_ascii_lowercase();
    let input = match cmd.as_str() {
        "edit" => ConsoleInput::Command(PanelCommand::StartEditing),
        "done" => ConsoleInput::Command(PanelCommand::StopEditing),
        "add" => ConsoleInput::Command(PanelCommand::AddRow),
        "sort" => ConsoleInput::Command(PanelCommand::SortRows),
        "show" | "status" => ConsoleInput::Show,
        "quit" | "exit" => ConsoleInput::Quit,
        "delete" => {
            let index = parse_index(words.next())?;
            ConsoleInput::Command(PanelCommand::DeleteRow(index))
        }
        "set" => {
            let index = parse_index(words.next())?;
            let field = words.next()?;
            let Some(field) = parse_field(field) else {
                warn!("[CONSOLE] Unknown column: {field}");
                return None;
            };
            ConsoleInput::Command(PanelCommand::UpdateRow(index, field, rest(words)))
        }
        "duration" => ConsoleInput::Command(PanelCommand::SetSleepDuration(rest(words))),
        "threshold" => ConsoleInput::Command(PanelCommand::SetSleepThreshold(rest(words))),
        "calibration" => {
            let mut session = CalibrationSession::new(committed, None);
            session.set_min(Entry::from(words.next()?));
            session.set_max(Entry::from(words.next()?));
            if let Some(errors) = session.field_errors().filter(|e| !e.is_empty()) {
                if let Some(e) = errors.min {
                    warn!("[CONSOLE] Minimum: {}", e.message());
                }
                if let Some(e) = errors.max {
                    warn!("[CONSOLE] Maximum: {}", e.message());
                }
                return None;
            }
            let Some(calibration) = session.commit() else {
                info!("[CONSOLE] Calibration unchanged");
                return None;
            };
            ConsoleInput::Command(PanelCommand::SetCalibration(calibration))
        }
        _ => {
            warn!("[CONSOLE] Unknown command: {cmd}");
            return None;
        }
    };
    Some(input)
}
