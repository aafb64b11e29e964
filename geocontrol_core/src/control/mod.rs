// geocontrol_core/src/control/mod.rs

use nalgebra::{Rotation3, Vector3};

use crate::errors::ControlError;
use crate::types::{CurrentState, DesiredState, WrenchCommand};

/// Position, velocity, attitude and angular-velocity errors of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingErrors {
    pub ex: Vector3<f64>,
    pub ev: Vector3<f64>,
    pub er: Vector3<f64>,
    pub eomega: Vector3<f64>,
}

/// Everything one control-law evaluation produces. Only `wrench` is sent on;
/// the rest is there for logging and debugging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    pub wrench: WrenchCommand,
    /// The attitude the controller is steering towards, `[b1d | b2d | b3d]`.
    pub desired_rotation: Rotation3<f64>,
    pub errors: TrackingErrors,
}

// --- The ControlLaw Trait ("Contract") ---
/// The contract for anything that turns a state pair into a wrench.
/// Implementations must be pure: same inputs, same output, no hidden state.
pub trait ControlLaw: Send + Sync {
    fn compute(
        &self,
        current: &CurrentState,
        desired: &DesiredState,
    ) -> Result<ControlOutput, ControlError>;
}

mod geometric;

pub use geometric::{compute_wrench, GeometricController, MIN_DIRECTION_NORM};
