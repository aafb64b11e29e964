// geocontrol_core/src/types.rs

use nalgebra::{Matrix3, Rotation3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::errors::ParamsError;

// =========================================================================
// == Snapshots (written by the feeds, read by the control tick) ==
// =========================================================================

/// The measured state of the vehicle, as delivered by the state estimator.
/// Always replaced wholesale; the control law only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentState {
    /// Position of the centre of mass in the world frame.
    pub position: Vector3<f64>,
    /// Linear velocity of the centre of mass in the world frame.
    pub velocity: Vector3<f64>,
    /// Attitude, mapping body-frame vectors into the world frame.
    pub orientation: Rotation3<f64>,
    /// Angular velocity expressed in the BODY frame.
    pub angular_velocity: Vector3<f64>,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: Rotation3::identity(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// One point of the reference trajectory.
/// Roll and pitch are not part of the reference; they follow from `acceleration`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DesiredState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
    /// Heading about the gravity axis [rad].
    pub yaw: f64,
}

// =========================================================================
// == Fixed Parameters ==
// =========================================================================

/// Feedback gains of the geometric tracking controller.
/// There is deliberately no `Default`: a controller must never run on made-up gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Gains {
    /// Position error gain.
    pub kx: f64,
    /// Velocity error gain.
    pub kv: f64,
    /// Attitude error gain.
    pub kr: f64,
    /// Angular velocity error gain.
    pub komega: f64,
}

impl Gains {
    pub fn new(kx: f64, kv: f64, kr: f64, komega: f64) -> Result<Self, ParamsError> {
        let gains = Self { kx, kv, kr, komega };
        gains.validate()?;
        Ok(gains)
    }

    /// Checks that every gain is a positive, finite number.
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (name, value) in [
            ("kx", self.kx),
            ("kv", self.kv),
            ("kr", self.kr),
            ("komega", self.komega),
        ] {
            require_positive(name, value)?;
        }
        Ok(())
    }
}

/// Physical constants of the airframe, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalParams {
    /// Vehicle mass [kg].
    pub mass: f64,
    /// Gravitational acceleration magnitude [m/s^2].
    pub gravity: f64,
    /// Distance from each propeller centre to the centre of mass [m].
    pub arm_length: f64,
    /// Propeller lift coefficient (thrust = cf * speed^2).
    pub lift_coefficient: f64,
    /// Propeller drag coefficient (reaction torque = cd * speed^2).
    pub drag_coefficient: f64,
    /// Inertia matrix in the body frame [kg m^2].
    pub inertia: Matrix3<f64>,
}

impl PhysicalParams {
    pub fn new(
        mass: f64,
        gravity: f64,
        arm_length: f64,
        lift_coefficient: f64,
        drag_coefficient: f64,
        inertia: Matrix3<f64>,
    ) -> Result<Self, ParamsError> {
        let params = Self {
            mass,
            gravity,
            arm_length,
            lift_coefficient,
            drag_coefficient,
            inertia,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        require_positive("mass", self.mass)?;
        require_positive("gravity", self.gravity)?;
        require_positive("arm_length", self.arm_length)?;
        require_positive("lift_coefficient", self.lift_coefficient)?;
        require_positive("drag_coefficient", self.drag_coefficient)?;

        let j = &self.inertia;
        if j.iter().any(|v| !v.is_finite()) || (j - j.transpose()).amax() > 1e-9 {
            return Err(ParamsError::InvalidInertia("matrix must be finite and symmetric"));
        }
        // Cholesky only succeeds for symmetric positive-definite input.
        if self.inertia.cholesky().is_none() {
            return Err(ParamsError::InvalidInertia("matrix must be positive-definite"));
        }
        Ok(())
    }

    /// The weight the rotors have to carry in hover, `m * g`.
    pub fn hover_thrust(&self) -> f64 {
        self.mass * self.gravity
    }
}

impl Default for PhysicalParams {
    /// The reference airframe: a 1 kg vehicle with 0.3 m arms.
    fn default() -> Self {
        Self {
            mass: 1.0,
            gravity: 9.81,
            arm_length: 0.3,
            lift_coefficient: 1e-3,
            drag_coefficient: 1e-5,
            inertia: Matrix3::identity(),
        }
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParamsError::NotPositive { name, value })
    }
}

// =========================================================================
// == Per-Tick Outputs ==
// =========================================================================

/// Collective thrust along the body z-axis plus body torques.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrenchCommand {
    /// [N]
    pub thrust: f64,
    /// [N m], body frame.
    pub torque: Vector3<f64>,
}

impl WrenchCommand {
    pub fn new(thrust: f64, torque: Vector3<f64>) -> Self {
        Self { thrust, torque }
    }

    /// Stacks the wrench as `[f; M]`, the layout the mixer matrix works on.
    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.thrust, self.torque.x, self.torque.y, self.torque.z)
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        Self {
            thrust: v[0],
            torque: Vector3::new(v[1], v[2], v[3]),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.thrust.is_finite() && self.torque.iter().all(|v| v.is_finite())
    }
}

/// Signed rotor angular speeds [rad/s] in the fixed rotor index order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotorSpeedCommand(pub [f64; 4]);

impl RotorSpeedCommand {
    pub fn speeds(&self) -> &[f64; 4] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|s| s.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gains_must_be_positive() {
        assert!(Gains::new(1.0, 2.0, 3.0, 4.0).is_ok());
        assert!(matches!(
            Gains::new(1.0, 0.0, 3.0, 4.0),
            Err(ParamsError::NotPositive { name: "kv", .. })
        ));
        assert!(Gains::new(1.0, 2.0, f64::NAN, 4.0).is_err());
        assert!(Gains::new(1.0, 2.0, 3.0, -4.0).is_err());
    }

    #[test]
    fn default_airframe_is_valid() {
        assert!(PhysicalParams::default().validate().is_ok());
    }

    #[test]
    fn inertia_must_be_symmetric_positive_definite() {
        let mut params = PhysicalParams::default();
        params.inertia[(0, 1)] = 0.5;
        assert!(matches!(params.validate(), Err(ParamsError::InvalidInertia(_))));

        let mut params = PhysicalParams::default();
        params.inertia[(2, 2)] = -1.0;
        assert!(matches!(params.validate(), Err(ParamsError::InvalidInertia(_))));
    }

    #[test]
    fn wrench_vector_layout() {
        let wrench = WrenchCommand::new(9.81, Vector3::new(0.1, -0.2, 0.3));
        let v = wrench.to_vector();
        assert_eq!(v, Vector4::new(9.81, 0.1, -0.2, 0.3));
        assert_eq!(WrenchCommand::from_vector(&v), wrench);
    }
}
