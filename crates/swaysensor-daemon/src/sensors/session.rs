//! State shared by all sensor events

use std::sync::OnceLock;

use swaysensor_config::LightCalibration;

use super::LightUnit;
use crate::backend::Backend;
use crate::display::DeviceIdentity;

/// Process-wide context handed to every translator
///
/// The backend and display are fixed at startup. The light unit is a latch:
/// the first unit observation wins and later ones are ignored.
#[derive(Debug)]
pub struct Session {
    backend: Backend,
    display: Option<DeviceIdentity>,
    calibration: LightCalibration,
    light_unit: OnceLock<LightUnit>,
}

impl Session {
    pub fn new(
        backend: Backend,
        display: Option<DeviceIdentity>,
        calibration: LightCalibration,
    ) -> Self {
        Self {
            backend,
            display,
            calibration,
            light_unit: OnceLock::new(),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Resolved primary display, absent for brightness-only setups
    pub fn display(&self) -> Option<&DeviceIdentity> {
        self.display.as_ref()
    }

    /// Latched light unit, `None` while still unknown
    pub fn light_unit(&self) -> Option<LightUnit> {
        self.light_unit.get().copied()
    }

    /// Latch the light unit; returns `false` if one was already latched
    pub fn latch_light_unit(&self, unit: LightUnit) -> bool {
        self.light_unit.set(unit).is_ok()
    }

    /// Level that corresponds to 100% brightness for `unit`
    pub fn reference_max(&self, unit: LightUnit) -> f64 {
        match unit {
            LightUnit::Vendor => self.calibration.vendor_max,
            LightUnit::SiLux => self.calibration.lux_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_unit_latches_once() {
        let session = Session::new(Backend::Sway, None, LightCalibration::default());
        assert_eq!(session.light_unit(), None);

        assert!(session.latch_light_unit(LightUnit::SiLux));
        assert!(!session.latch_light_unit(LightUnit::Vendor));
        assert_eq!(session.light_unit(), Some(LightUnit::SiLux));
    }

    #[test]
    fn test_reference_max_follows_calibration() {
        let calibration = LightCalibration {
            vendor_max: 255.0,
            lux_max: 500.0,
        };
        let session = Session::new(Backend::Hyprland, None, calibration);
        assert_eq!(session.reference_max(LightUnit::Vendor), 255.0);
        assert_eq!(session.reference_max(LightUnit::SiLux), 500.0);
    }
}
