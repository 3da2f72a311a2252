//! Sensor property classification and translation
//!
//! iio-sensor-proxy reports changes as `(property name, value)` pairs on
//! `net.hadess.SensorProxy`. This module turns each pair into a typed
//! [`SensorProperty`] and from there into a compositor command.
//!
//! ## Architecture
//!
//! - `SensorBus`: system bus adapter that claims sensors and streams changes
//! - `SensorDispatcher`: classifies each change and sends the command
//! - `Session`: state shared across events (backend, display, light unit)
//! - `translate`: pure functions from a reading to a command

mod bus;
mod dispatcher;
mod session;
pub mod translate;

pub use bus::{BusError, Sensor, SensorBus};
pub use dispatcher::{DispatchReport, SensorDispatcher};
pub use session::Session;
pub use translate::TranslateError;

use std::fmt;

/// Value of a sensor property as delivered by the bus
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Str(String),
    Double(f64),
    Bool(bool),
}

impl SensorValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Double(_) => "double",
            Self::Bool(_) => "boolean",
        }
    }
}

impl From<&str> for SensorValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SensorValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for SensorValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One property-changed notification
pub type PropertyBatch = Vec<(String, SensorValue)>;

/// Sensor family a property belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Accelerometer,
    Light,
    Proximity,
    Compass,
    /// `Has*` properties announcing sensor presence
    Availability,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accelerometer => "accelerometer",
            Self::Light => "light",
            Self::Proximity => "proximity",
            Self::Compass => "compass",
            Self::Availability => "availability",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelerometerProperty {
    Orientation,
    Tilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightProperty {
    Level,
    Unit,
}

/// A classified sensor property name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorProperty {
    Accelerometer(AccelerometerProperty),
    Light(LightProperty),
    Proximity,
    Compass,
    Availability,
}

/// Index of the character after `Accelerometer` in accelerometer properties
const ACCELEROMETER_DISCRIMINATOR: usize = 13;

/// Index of the character after `LightLevel` in light properties
const LIGHT_DISCRIMINATOR: usize = 10;

impl SensorProperty {
    /// Classify a property name
    ///
    /// Relies on the iio-sensor-proxy naming scheme rather than comparing
    /// whole names:
    ///
    /// - the first letter selects the family (`Accelerometer*`, `Light*`,
    ///   `Proximity*`, `Compass*`, `Has*`);
    /// - `AccelerometerOrientation` and `AccelerometerTilt` differ at index 13;
    /// - `LightLevel` ends at index 10 where `LightLevelUnit` continues
    ///   with `U`.
    ///
    /// Returns `None` for names outside that scheme.
    pub fn classify(key: &str) -> Option<Self> {
        let bytes = key.as_bytes();

        match bytes.first()? {
            b'A' => match bytes.get(ACCELEROMETER_DISCRIMINATOR)? {
                b'O' => Some(Self::Accelerometer(AccelerometerProperty::Orientation)),
                b'T' => Some(Self::Accelerometer(AccelerometerProperty::Tilt)),
                _ => None,
            },
            b'L' => match bytes.get(LIGHT_DISCRIMINATOR) {
                None if bytes.len() == LIGHT_DISCRIMINATOR => {
                    Some(Self::Light(LightProperty::Level))
                }
                Some(b'U') => Some(Self::Light(LightProperty::Unit)),
                _ => None,
            },
            b'P' => Some(Self::Proximity),
            b'C' => Some(Self::Compass),
            b'H' => Some(Self::Availability),
            _ => None,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Accelerometer(_) => Category::Accelerometer,
            Self::Light(_) => Category::Light,
            Self::Proximity => Category::Proximity,
            Self::Compass => Category::Compass,
            Self::Availability => Category::Availability,
        }
    }
}

/// Display orientation reported by the accelerometer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    BottomUp,
    LeftUp,
    RightUp,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Normal,
        Orientation::BottomUp,
        Orientation::LeftUp,
        Orientation::RightUp,
    ];

    /// Name iio-sensor-proxy uses for this orientation
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::BottomUp => "bottom-up",
            Self::LeftUp => "left-up",
            Self::RightUp => "right-up",
        }
    }

    /// Classify an orientation reading
    ///
    /// The first character picks the candidate; the reading must then match
    /// the candidate's full name. `undefined` and anything else yield `None`.
    pub fn classify(value: &str) -> Option<Self> {
        let candidate = match value.as_bytes().first()? {
            b'n' => Self::Normal,
            b'b' => Self::BottomUp,
            b'l' => Self::LeftUp,
            b'r' => Self::RightUp,
            _ => return None,
        };
        (candidate.name() == value).then_some(candidate)
    }
}

/// Device tilt reported by the accelerometer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tilt {
    Vertical,
    TiltedUp,
    TiltedDown,
    FaceUp,
    FaceDown,
}

/// Index at which every tilt name differs from the others
const TILT_DISCRIMINATOR: usize = 7;

impl Tilt {
    /// Classify a tilt reading by its eighth character
    ///
    /// `face-up` is the only name that ends before that position.
    pub fn classify(value: &str) -> Option<Self> {
        match value.as_bytes().get(TILT_DISCRIMINATOR) {
            Some(b'l') => Some(Self::Vertical),   // vertica(l)
            Some(b'u') => Some(Self::TiltedUp),   // tilted-(u)p
            Some(b'd') => Some(Self::TiltedDown), // tilted-(d)own
            Some(b'w') => Some(Self::FaceDown),   // face-do(w)n
            None if value == "face-up" => Some(Self::FaceUp),
            _ => None,
        }
    }
}

/// Unit of ambient light readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightUnit {
    /// Vendor-defined scale
    Vendor,
    /// SI lux
    SiLux,
}

impl LightUnit {
    /// Interpret the `LightLevelUnit` descriptor
    pub fn from_descriptor(descriptor: &str) -> Self {
        if descriptor.contains("lux") {
            Self::SiLux
        } else {
            Self::Vendor
        }
    }
}
