// geocontrol_core/src/errors.rs

use thiserror::Error;

/// Invalid gains or physical parameters. Always a startup-time failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("parameter `{name}` must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("invalid inertia matrix: {0}")]
    InvalidInertia(&'static str),
}

/// An incoming feed message that cannot be turned into a state snapshot.
/// The message is dropped and the previous snapshot stays in effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    #[error("trajectory point has no `{0}` entry")]
    MissingEntry(&'static str),

    #[error("field `{0}` contains a non-finite value")]
    NonFinite(&'static str),

    #[error("quaternion in `{0}` has (near) zero norm and cannot be normalised")]
    DegenerateQuaternion(&'static str),
}

/// Failures of a single control-law evaluation. The tick publishes nothing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("desired force vector is degenerate (|A| = {norm:e}), cannot define a thrust direction")]
    DegenerateThrust { norm: f64 },

    #[error("desired thrust direction is parallel to the heading (|b3d x h| = {norm:e})")]
    DegenerateHeading { norm: f64 },

    #[error("control law produced a non-finite wrench")]
    NonFinite,
}

/// Failures of the actuator allocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixerError {
    #[error("mixer matrix is singular for cf = {lift_coefficient}, cd = {drag_coefficient}, d = {arm_length}")]
    Singular {
        lift_coefficient: f64,
        drag_coefficient: f64,
        arm_length: f64,
    },

    #[error("rotor allocation produced a non-finite speed")]
    NonFinite,
}
