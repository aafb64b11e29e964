// geocontrol_core/src/frames.rs

//! Frame and sign conventions shared by the feeds and the control law.
//!
//! The world frame is a fixed inertial frame with its z-axis pointing UP, away
//! from gravity (ENU-style). The body frame rotates with the vehicle; its z-axis
//! is the direction in which the propellers push. A port to a z-down convention
//! only has to touch the constants in this file.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};

/// `e3`: the world axis opposite to gravity. Gravity acts along `-GRAVITY_AXIS`.
pub const GRAVITY_AXIS: Vector3<f64> = Vector3::new(0.0, 0.0, 1.0);

/// Axis along which the rotors produce thrust, expressed in the body frame.
pub const THRUST_AXIS_BODY: Vector3<f64> = Vector3::new(0.0, 0.0, 1.0);

/// Rotates a world-frame vector into the body frame: `v_body = R^T v_world`.
pub fn world_to_body(orientation: &Rotation3<f64>, v_world: &Vector3<f64>) -> Vector3<f64> {
    orientation.inverse_transform_vector(v_world)
}

/// The body thrust axis expressed in the world frame: `R e3`.
pub fn thrust_axis_world(orientation: &Rotation3<f64>) -> Vector3<f64> {
    orientation * THRUST_AXIS_BODY
}

/// Heading about the gravity axis (ZYX yaw), discarding roll and pitch.
pub fn yaw_from_quaternion(q: &UnitQuaternion<f64>) -> f64 {
    // Same as `q.euler_angles().2`, written out so it stays well defined at gimbal lock.
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
}

/// Horizontal unit vector pointing along `yaw`, measured from the world x-axis.
pub fn heading_vector(yaw: f64) -> Vector3<f64> {
    Vector3::new(yaw.cos(), yaw.sin(), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn world_to_body_inverts_the_attitude() {
        // Body yawed by +90 degrees: the world x-axis is the body's -y axis.
        let r = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let v_body = world_to_body(&r, &Vector3::x());
        assert_relative_eq!(v_body, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(r * v_body, Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn yaw_ignores_roll_and_pitch() {
        let q = UnitQuaternion::from_euler_angles(0.3, -0.2, FRAC_PI_4);
        assert_relative_eq!(yaw_from_quaternion(&q), FRAC_PI_4, epsilon = 1e-12);

        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -2.0);
        assert_relative_eq!(yaw_from_quaternion(&q), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn thrust_axis_of_level_vehicle_points_up() {
        assert_eq!(thrust_axis_world(&Rotation3::identity()), GRAVITY_AXIS);
    }

    #[test]
    fn heading_is_horizontal_unit_vector() {
        let h = heading_vector(1.234);
        assert_relative_eq!(h.norm(), 1.0, epsilon = 1e-12);
        assert_eq!(h.z, 0.0);
    }
}
