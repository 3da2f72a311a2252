//! Configuration data model

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub global: GlobalConfig,
    pub sensors: SensorSelection,
    pub light: LightCalibration,
}

/// Global settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Which sensors the daemon claims from the sensor proxy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSelection {
    pub accelerometer: bool,
    pub light: bool,
    pub proximity: bool,
}

impl SensorSelection {
    /// True when at least one sensor is enabled
    pub fn any(&self) -> bool {
        self.accelerometer || self.light || self.proximity
    }

    /// True when an enabled sensor produces commands aimed at a display
    ///
    /// Orientation and proximity commands name an output; brightness does not.
    pub fn needs_display(&self) -> bool {
        self.accelerometer || self.proximity
    }

    /// Enable every sensor that is enabled in `other` as well
    pub fn merge(&mut self, other: SensorSelection) {
        self.accelerometer |= other.accelerometer;
        self.light |= other.light;
        self.proximity |= other.proximity;
    }
}

/// Reference maxima used to turn a light level into a brightness percentage
///
/// These are calibration values, not physical constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightCalibration {
    /// Level that maps to 100% when the proxy reports a vendor-defined scale
    pub vendor_max: f64,
    /// Level that maps to 100% when the proxy reports SI lux
    pub lux_max: f64,
}

impl Default for LightCalibration {
    fn default() -> Self {
        Self {
            vendor_max: 100.0,
            lux_max: 1200.0,
        }
    }
}
