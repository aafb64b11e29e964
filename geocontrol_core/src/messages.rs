// geocontrol_core/src/messages.rs

//! Transport-agnostic feed messages. Field names follow the usual robotics
//! message layouts (odometry, multi-DOF trajectory point, actuators) so that a
//! bridge can forward them without renaming anything.

use nalgebra::{Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::errors::MessageError;
use crate::frames::{world_to_body, yaw_from_quaternion};
use crate::types::{CurrentState, DesiredState, RotorSpeedCommand};

/// Quaternions shorter than this are rejected instead of being normalised.
const MIN_QUATERNION_NORM: f64 = 1e-6;

// =========================================================================
// == Primitive Building Blocks ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3Msg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3Msg {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn to_vector(self, field: &'static str) -> Result<Vector3<f64>, MessageError> {
        let v = Vector3::new(self.x, self.y, self.z);
        if v.iter().all(|c| c.is_finite()) {
            Ok(v)
        } else {
            Err(MessageError::NonFinite(field))
        }
    }
}

impl From<Vector3<f64>> for Vec3Msg {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Quaternion in `(x, y, z, w)` field order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl QuaternionMsg {
    fn to_unit(self, field: &'static str) -> Result<UnitQuaternion<f64>, MessageError> {
        let q = Quaternion::new(self.w, self.x, self.y, self.z);
        if !q.coords.iter().all(|c| c.is_finite()) {
            return Err(MessageError::NonFinite(field));
        }
        UnitQuaternion::try_new(q, MIN_QUATERNION_NORM)
            .ok_or(MessageError::DegenerateQuaternion(field))
    }
}

impl From<UnitQuaternion<f64>> for QuaternionMsg {
    fn from(q: UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3Msg,
    pub orientation: QuaternionMsg,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vec3Msg,
    pub angular: Vec3Msg,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3Msg,
    pub rotation: QuaternionMsg,
}

// =========================================================================
// == Feed Messages ==
// =========================================================================

/// Current-state feed. Everything is expressed in the world frame, including
/// `twist.angular`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Odometry {
    pub pose: Pose,
    pub twist: Twist,
}

/// Desired-state feed. Only the first entry of each list is used; an empty
/// list makes the whole point unusable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub transforms: Vec<Transform>,
    pub velocities: Vec<Twist>,
    pub accelerations: Vec<Twist>,
}

/// Rotor-speed output, one signed angular speed per rotor [rad/s].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Actuators {
    pub angular_velocities: [f64; 4],
}

impl From<RotorSpeedCommand> for Actuators {
    fn from(cmd: RotorSpeedCommand) -> Self {
        Self {
            angular_velocities: cmd.0,
        }
    }
}

// =========================================================================
// == Conversions into Snapshots ==
// =========================================================================

impl TryFrom<&Odometry> for CurrentState {
    type Error = MessageError;

    fn try_from(msg: &Odometry) -> Result<Self, Self::Error> {
        let position = msg.pose.position.to_vector("pose.position")?;
        let velocity = msg.twist.linear.to_vector("twist.linear")?;
        let orientation: Rotation3<f64> =
            msg.pose.orientation.to_unit("pose.orientation")?.to_rotation_matrix();
        let angular_velocity_world = msg.twist.angular.to_vector("twist.angular")?;

        Ok(CurrentState {
            position,
            velocity,
            orientation,
            // The feed reports angular velocity in the world frame; the control
            // law works with body rates.
            angular_velocity: world_to_body(&orientation, &angular_velocity_world),
        })
    }
}

impl TryFrom<&TrajectoryPoint> for DesiredState {
    type Error = MessageError;

    fn try_from(msg: &TrajectoryPoint) -> Result<Self, Self::Error> {
        let transform = msg
            .transforms
            .first()
            .ok_or(MessageError::MissingEntry("transforms"))?;
        let velocity = msg
            .velocities
            .first()
            .ok_or(MessageError::MissingEntry("velocities"))?;
        let acceleration = msg
            .accelerations
            .first()
            .ok_or(MessageError::MissingEntry("accelerations"))?;

        let rotation = transform.rotation.to_unit("transforms[0].rotation")?;

        Ok(DesiredState {
            position: transform.translation.to_vector("transforms[0].translation")?,
            velocity: velocity.linear.to_vector("velocities[0].linear")?,
            acceleration: acceleration.linear.to_vector("accelerations[0].linear")?,
            yaw: yaw_from_quaternion(&rotation),
        })
    }
}
