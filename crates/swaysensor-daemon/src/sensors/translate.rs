//! Translation of sensor readings into compositor commands
//!
//! Every translator returns `Ok(Some(command))` when there is something to
//! send, `Ok(None)` when the reading legitimately produces no command, and
//! an error when a command should have been built but could not be.

use thiserror::Error;
use tracing::debug;

use super::{Category, LightUnit, Orientation, Session, Tilt};
use crate::display::DeviceIdentity;
use crate::ipc::{Command, IpcError};

/// Errors raised while turning a reading into a command
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The orientation reading matched no table entry
    #[error("Unrecognized orientation `{value}`")]
    UnknownOrientation { value: String },

    /// A display command was requested before the display was resolved
    #[error("No display resolved for {category} command")]
    MissingIdentity { category: Category },

    /// The property carried a value of the wrong type
    #[error("Property {key} carried a {actual}, expected a {expected}")]
    UnexpectedValue {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The command does not fit the backend's payload limit
    #[error("Failed to build command: {0}")]
    Command(#[from] IpcError),
}

fn display(session: &Session, category: Category) -> Result<&DeviceIdentity, TranslateError> {
    session
        .display()
        .ok_or(TranslateError::MissingIdentity { category })
}

/// Rotate the display to match the accelerometer orientation
///
/// An unrecognized or `undefined` orientation fails closed: no command.
pub fn orientation(session: &Session, value: &str) -> Result<Option<Command>, TranslateError> {
    let orientation =
        Orientation::classify(value).ok_or_else(|| TranslateError::UnknownOrientation {
            value: value.to_string(),
        })?;
    let display = display(session, Category::Accelerometer)?;

    let backend = session.backend();
    let command = Command::new(backend, backend.rotate_command(display.name(), orientation))?;
    Ok(Some(command))
}

/// Tilt changes are classified but have no action yet
pub fn tilt(session: &Session, value: &str) -> Result<Option<Command>, TranslateError> {
    let vocab = session.backend().vocabulary();
    match (Tilt::classify(value), vocab.tilt_word) {
        (Some(tilt), None) => debug!(?tilt, "No tilt action defined"),
        (Some(tilt), Some(word)) => debug!(?tilt, word, "Tilt action not wired"),
        (None, _) => debug!(value, "Unrecognized tilt"),
    }
    Ok(None)
}

/// Latch the ambient light unit; never produces a command
pub fn light_unit(session: &Session, descriptor: &str) -> Result<Option<Command>, TranslateError> {
    let unit = LightUnit::from_descriptor(descriptor);
    if session.latch_light_unit(unit) {
        debug!(?unit, descriptor, "Light unit latched");
    } else {
        debug!(descriptor, "Light unit already latched, ignoring");
    }
    Ok(None)
}

/// Set the backlight from an ambient light level
///
/// Levels observed before the unit is known are dropped, since the
/// percentage depends on the unit's reference maximum.
pub fn light_level(session: &Session, level: f64) -> Result<Option<Command>, TranslateError> {
    let Some(unit) = session.light_unit() else {
        debug!(level, "Light level before unit is known, ignoring");
        return Ok(None);
    };

    let percent = brightness_percent(level, session.reference_max(unit));
    let backend = session.backend();
    let command = Command::new(backend, backend.brightness_command(percent))?;
    Ok(Some(command))
}

/// Power the display off while something is near, on otherwise
pub fn proximity(session: &Session, near: bool) -> Result<Option<Command>, TranslateError> {
    let display = display(session, Category::Proximity)?;

    let backend = session.backend();
    let command = Command::new(backend, backend.power_command(display.name(), !near))?;
    Ok(Some(command))
}

/// `round(level * 100 / reference_max)`, kept within 0..=100
pub fn brightness_percent(level: f64, reference_max: f64) -> u8 {
    let percent = (level * 100.0 / reference_max).round();
    // NaN falls through to 0
    percent.clamp(0.0, 100.0) as u8
}
