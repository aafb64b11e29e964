// geocontrol_core/src/mixing/mod.rs

//! Actuator allocation between the wrench and the four rotors.
//!
//! Rotor layout (X configuration, arms at 45 degrees to the body axes, seen from above
//! with body x forward and body y left):
//!
//! ```text
//!   rotor 0 (+x, +y)   rotor 3 (+x, -y)
//!   rotor 1 (-x, +y)   rotor 2 (-x, -y)
//! ```
//!
//! Rotors 0 and 2 react with a positive yaw torque, rotors 1 and 3 with a negative one.

use std::f64::consts::FRAC_1_SQRT_2;

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::errors::MixerError;
use crate::types::{PhysicalParams, RotorSpeedCommand, WrenchCommand};
use crate::utils::so3::{signed_sqrt, signed_square};

/// Fraction of the arm length that acts as a moment arm about each body axis.
/// `cos(45 deg)` for the X configuration.
pub const ARM_PROJECTION: f64 = FRAC_1_SQRT_2;

/// Options of the allocation that do not follow from the airframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixerConfig {
    /// Negate every output speed. For simulators in which a negative rotor speed
    /// is the one that produces lift.
    #[serde(default)]
    pub reversed_spin: bool,
}

/// The fixed wrench <-> rotor map `F2W` and its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorMixer {
    /// Maps thrust-equivalents `sign(s_i) * s_i^2` to `[f; M]`.
    f2w: Matrix4<f64>,
    /// Inverted once at construction and reused every tick.
    w2f: Matrix4<f64>,
    config: MixerConfig,
}

impl ActuatorMixer {
    pub fn new(params: &PhysicalParams, config: MixerConfig) -> Result<Self, MixerError> {
        let cf = params.lift_coefficient;
        let cd = params.drag_coefficient;
        let a = cf * params.arm_length * ARM_PROJECTION;

        #[rustfmt::skip]
        let f2w = Matrix4::new(
            cf,  cf,  cf,  cf,
             a,   a,  -a,  -a,
            -a,   a,   a,  -a,
            cd, -cd,  cd, -cd,
        );

        let singular = || MixerError::Singular {
            lift_coefficient: cf,
            drag_coefficient: cd,
            arm_length: params.arm_length,
        };
        let w2f = f2w.try_inverse().ok_or_else(singular)?;
        if w2f.iter().any(|v| !v.is_finite()) {
            return Err(singular());
        }

        Ok(Self { f2w, w2f, config })
    }

    /// The forward map `F2W`.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.f2w
    }

    /// The precomputed inverse `F2W^-1`.
    pub fn inverse(&self) -> &Matrix4<f64> {
        &self.w2f
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Per-rotor thrust-equivalents `w = F2W^-1 [f; M]` needed for `wrench`.
    pub fn thrust_equivalents(&self, wrench: &WrenchCommand) -> Vector4<f64> {
        self.w2f * wrench.to_vector()
    }

    /// Rotor speeds for `wrench`: `speed_i = sign(w_i) * sqrt(|w_i|)`.
    /// Negative speeds are passed through untouched.
    pub fn allocate(&self, wrench: &WrenchCommand) -> Result<RotorSpeedCommand, MixerError> {
        let w = self.thrust_equivalents(wrench);
        let direction = if self.config.reversed_spin { -1.0 } else { 1.0 };

        let mut speeds = [0.0; 4];
        for (speed, w_i) in speeds.iter_mut().zip(w.iter()) {
            *speed = direction * signed_sqrt(*w_i);
        }

        let command = RotorSpeedCommand(speeds);
        if !command.is_finite() {
            return Err(MixerError::NonFinite);
        }
        Ok(command)
    }

    /// The wrench a set of thrust-equivalents produces, `F2W w`.
    pub fn forward(&self, thrust_equivalents: &Vector4<f64>) -> WrenchCommand {
        WrenchCommand::from_vector(&(self.f2w * thrust_equivalents))
    }

    /// The wrench the rotors deliver when spinning at `command`. Inverse of [`Self::allocate`].
    pub fn wrench_from_speeds(&self, command: &RotorSpeedCommand) -> WrenchCommand {
        let direction = if self.config.reversed_spin { -1.0 } else { 1.0 };
        let w = Vector4::from_iterator(command.0.iter().map(|s| signed_square(direction * s)));
        self.forward(&w)
    }
}
