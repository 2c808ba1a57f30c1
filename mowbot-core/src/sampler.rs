//! Input Sampler: stick and button readings to force and bearing.

use core::future::Future;

use crate::config::SamplerConfig;

/// One raw reading of the stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawStick {
    /// X axis (left/right), 16-bit scale.
    pub x: u16,
    /// Y axis (up/down), 16-bit scale.
    pub y: u16,
    /// Momentary button, `true` while held.
    pub button: bool,
}

/// Error type for stick reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// ADC conversion failed.
    Adc,
    /// Button could not be read.
    Gpio,
}

/// Async trait for the analog stick and its button.
pub trait StickSource {
    /// Read both axes and the button once.
    fn read(&mut self) -> impl Future<Output = Result<RawStick, InputError>>;
}

/// Normalized stick position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sample {
    /// Force inside the deadzone.
    Rest,
    /// Deliberate deflection. `force` is rounded to two decimals and may
    /// exceed 1.0 in the corners; `bearing` is in `0.0..360.0`, rounded to
    /// one decimal.
    Motion { force: f32, bearing: f32 },
}

/// Converts raw stick readings into [`Sample`]s.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    /// Create a sampler with the given calibration.
    pub const fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the calibration.
    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Centre and scale one raw axis to roughly `-1.0..=1.0`.
    #[inline]
    #[must_use]
    pub fn normalize(&self, raw: u16, invert: bool) -> f32 {
        let value = (raw as f32 - self.config.center as f32) / self.config.span;
        if invert {
            -value
        } else {
            value
        }
    }

    /// Sample a raw reading (button ignored).
    #[must_use]
    pub fn sample_raw(&self, raw: RawStick) -> Sample {
        let x = self.normalize(raw.x, self.config.invert_x);
        let y = self.normalize(raw.y, self.config.invert_y);
        self.sample(x, y)
    }

    /// Sample normalized Cartesian displacement.
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> Sample {
        let force = round_to(libm::sqrtf(x * x + y * y), 100.0);
        if force.is_nan() || force <= self.config.deadzone {
            return Sample::Rest;
        }
        let angle = libm::atan2f(y, x).to_degrees();
        Sample::Motion {
            force,
            bearing: remap_bearing(angle),
        }
    }
}

/// Convert a mathematical angle (0 = east, counter-clockwise, `-180..=180`)
/// into a compass bearing (0 = forward, clockwise, `0.0..360.0`), rounded to
/// one decimal.
#[must_use]
pub fn remap_bearing(angle: f32) -> f32 {
    let compass = if angle >= -90.0 {
        90.0 - angle
    } else {
        -angle - 270.0
    };
    let bearing = round_to(compass, 10.0);
    let bearing = if bearing < 0.0 { bearing + 360.0 } else { bearing };
    if bearing >= 360.0 || bearing == 0.0 {
        0.0
    } else {
        bearing
    }
}

#[inline]
fn round_to(value: f32, scale: f32) -> f32 {
    libm::roundf(value * scale) / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> Sampler {
        Sampler::new(SamplerConfig::DEFAULT)
    }

    #[test]
    fn test_remap_quadrant_boundaries() {
        assert_eq!(remap_bearing(0.0), 90.0);
        assert_eq!(remap_bearing(90.0), 0.0);
        assert_eq!(remap_bearing(-90.0), 180.0);
        assert_eq!(remap_bearing(180.0), 270.0);
        assert_eq!(remap_bearing(-180.0), 270.0);
    }

    #[test]
    fn test_remap_diagonals() {
        assert_eq!(remap_bearing(45.0), 45.0);
        assert_eq!(remap_bearing(135.0), 315.0);
        assert_eq!(remap_bearing(-45.0), 135.0);
        assert_eq!(remap_bearing(-135.0), 225.0);
    }

    #[test]
    fn test_remap_rounds_to_one_decimal() {
        assert_eq!(remap_bearing(-35.44), 125.4);
        assert_eq!(remap_bearing(89.99), 0.0);
    }

    #[test]
    fn test_stick_directions() {
        let s = sampler();
        assert_eq!(s.sample(0.0, 1.0), Sample::Motion { force: 1.0, bearing: 0.0 });
        assert_eq!(s.sample(1.0, 0.0), Sample::Motion { force: 1.0, bearing: 90.0 });
        assert_eq!(s.sample(0.0, -1.0), Sample::Motion { force: 1.0, bearing: 180.0 });
        assert_eq!(s.sample(-1.0, 0.0), Sample::Motion { force: 1.0, bearing: 270.0 });
    }

    #[test]
    fn test_deadzone_boundary() {
        let s = sampler();
        assert_eq!(s.sample(0.0, 0.0), Sample::Rest);
        assert_eq!(s.sample(0.3, 0.0), Sample::Rest);
        assert_eq!(s.sample(0.0, -0.3), Sample::Rest);
        assert_eq!(s.sample(0.31, 0.0), Sample::Motion { force: 0.31, bearing: 90.0 });
    }

    #[test]
    fn test_force_is_rounded_norm() {
        let s = sampler();
        // sqrt(0.6^2 + 0.8^2) = 1.0
        match s.sample(0.6, 0.8) {
            Sample::Motion { force, .. } => assert_eq!(force, 1.0),
            Sample::Rest => panic!("expected motion"),
        }
        // corners exceed 1.0 before clamping
        match s.sample(1.0, 1.0) {
            Sample::Motion { force, bearing } => {
                assert_eq!(force, 1.41);
                assert_eq!(bearing, 45.0);
            }
            Sample::Rest => panic!("expected motion"),
        }
    }

    #[test]
    fn test_raw_normalization() {
        let s = sampler();
        assert_eq!(s.normalize(32768, false), 0.0);
        assert_eq!(s.normalize(32768 + 28456, false), 1.0);
        // forward reads low on the Y axis
        assert_eq!(s.normalize(32768 - 28456, true), 1.0);

        let centred = RawStick { x: 32768, y: 32768, button: true };
        assert_eq!(s.sample_raw(centred), Sample::Rest);

        let forward = RawStick { x: 32768, y: 32768 - 28456, button: false };
        assert_eq!(s.sample_raw(forward), Sample::Motion { force: 1.0, bearing: 0.0 });
    }
}
