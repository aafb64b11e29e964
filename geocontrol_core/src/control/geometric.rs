// geocontrol_core/src/control/geometric.rs

//! Geometric tracking control on SE(3) (Lee, Leok and McClamroch, CDC 2010).
//!
//! The paper works with a z-down world frame. Here `GRAVITY_AXIS` points up,
//! which flips the sign of the gravity term and of the thrust projection; the
//! resulting law is the same. Terms involving the desired angular velocity and
//! its derivative are dropped: the reference trajectory does not carry them and
//! their effect on the closed loop is second order.

use nalgebra::{Matrix3, Rotation3, Vector3};

use super::{ControlLaw, ControlOutput, TrackingErrors};
use crate::errors::{ControlError, ParamsError};
use crate::frames::{heading_vector, thrust_axis_world, GRAVITY_AXIS};
use crate::types::{CurrentState, DesiredState, Gains, PhysicalParams, WrenchCommand};
use crate::utils::so3::vee;

/// Vectors shorter than this are not normalised. Below it the desired attitude
/// is not defined (free fall, or thrust direction parallel to the heading).
pub const MIN_DIRECTION_NORM: f64 = 1e-6;

/// PURE FUNCTION: one evaluation of the geometric tracking controller.
pub fn compute_wrench(
    current: &CurrentState,
    desired: &DesiredState,
    gains: &Gains,
    params: &PhysicalParams,
) -> Result<ControlOutput, ControlError> {
    let r: Matrix3<f64> = *current.orientation.matrix();
    let omega = current.angular_velocity;

    // 1. Translational errors (world frame).
    let ex = current.position - desired.position;
    let ev = current.velocity - desired.velocity;

    // 2. Desired force and the body z-axis that delivers it.
    let force = -gains.kx * ex - gains.kv * ev
        + params.mass * params.gravity * GRAVITY_AXIS
        + params.mass * desired.acceleration;
    let force_norm = force.norm();
    // Written negated so that a NaN norm is caught as well.
    if !(force_norm >= MIN_DIRECTION_NORM) {
        return Err(ControlError::DegenerateThrust { norm: force_norm });
    }
    let b3d = force / force_norm;

    // 3. Remaining desired axes. The heading comes from the yaw reference and
    //    has to exist before b2d can be formed from it.
    let heading = heading_vector(desired.yaw);
    let b2d_unnormalised = b3d.cross(&heading);
    let b2d_norm = b2d_unnormalised.norm();
    if !(b2d_norm >= MIN_DIRECTION_NORM) {
        return Err(ControlError::DegenerateHeading { norm: b2d_norm });
    }
    let b2d = b2d_unnormalised / b2d_norm;
    let b1d = b2d.cross(&b3d);

    // 4. Desired attitude.
    let rd = Matrix3::from_columns(&[b1d, b2d, b3d]);

    // 5. + 6. Attitude and angular-velocity errors (body frame).
    let er = 0.5 * vee(&(rd.transpose() * r - r.transpose() * rd));
    let eomega = omega;

    // 7. Thrust along the current body z-axis, PD torque plus gyroscopic compensation.
    let thrust = force.dot(&thrust_axis_world(&current.orientation));
    let torque: Vector3<f64> =
        -gains.kr * er - gains.komega * eomega + omega.cross(&(params.inertia * omega));

    let wrench = WrenchCommand::new(thrust, torque);
    if !wrench.is_finite() {
        return Err(ControlError::NonFinite);
    }

    Ok(ControlOutput {
        wrench,
        desired_rotation: Rotation3::from_matrix_unchecked(rd),
        errors: TrackingErrors { ex, ev, er, eomega },
    })
}

/// The geometric controller with its gains and airframe bound in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricController {
    gains: Gains,
    params: PhysicalParams,
}

impl GeometricController {
    pub fn new(gains: Gains, params: PhysicalParams) -> Result<Self, ParamsError> {
        gains.validate()?;
        params.validate()?;
        Ok(Self { gains, params })
    }

    pub fn gains(&self) -> &Gains {
        &self.gains
    }

    pub fn params(&self) -> &PhysicalParams {
        &self.params
    }
}

impl ControlLaw for GeometricController {
    fn compute(
        &self,
        current: &CurrentState,
        desired: &DesiredState,
    ) -> Result<ControlOutput, ControlError> {
        compute_wrench(current, desired, &self.gains, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn gains() -> Gains {
        Gains::new(4.0, 3.0, 2.0, 0.5).unwrap()
    }

    fn hover_pair() -> (CurrentState, DesiredState) {
        (CurrentState::default(), DesiredState::default())
    }

    fn random_vector(rng: &mut ChaCha8Rng, scale: f64) -> Vector3<f64> {
        Vector3::new(
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
        )
    }

    #[test]
    fn desired_axes_form_right_handed_orthonormal_basis() {
        let params = PhysicalParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut checked = 0;

        for _ in 0..500 {
            let current = CurrentState {
                position: random_vector(&mut rng, 5.0),
                velocity: random_vector(&mut rng, 3.0),
                orientation: Rotation3::new(random_vector(&mut rng, PI)),
                angular_velocity: random_vector(&mut rng, 2.0),
            };
            let desired = DesiredState {
                position: random_vector(&mut rng, 5.0),
                velocity: random_vector(&mut rng, 3.0),
                acceleration: random_vector(&mut rng, 15.0),
                yaw: rng.gen_range(-PI..PI),
            };

            let Ok(output) = compute_wrench(&current, &desired, &gains(), &params) else {
                continue;
            };
            checked += 1;

            let rd = output.desired_rotation.matrix();
            let (b1, b2, b3) = (rd.column(0), rd.column(1), rd.column(2));
            assert_abs_diff_eq!(b1.norm(), 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(b2.norm(), 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(b3.norm(), 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(b1.dot(&b2), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(b2.dot(&b3), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(b1.dot(&b3), 0.0, epsilon = 1e-9);
            assert_relative_eq!(b1.cross(&b2), b3.into_owned(), epsilon = 1e-9);
            assert!(output.wrench.is_finite());
        }

        assert!(checked > 450, "too many degenerate samples: {checked}");
    }

    #[test]
    fn hover_needs_weight_and_no_torque() {
        let params = PhysicalParams::default();
        let (current, desired) = hover_pair();
        let output = compute_wrench(&current, &desired, &gains(), &params).unwrap();

        assert_relative_eq!(output.wrench.thrust, params.mass * params.gravity, epsilon = 1e-12);
        assert_abs_diff_eq!(output.wrench.torque, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(output.desired_rotation, Rotation3::identity(), epsilon = 1e-12);
        assert_abs_diff_eq!(output.errors.er, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn pure_yaw_error_only_torques_about_vertical_axis() {
        let params = PhysicalParams::default();
        let (current, mut desired) = hover_pair();
        desired.yaw = FRAC_PI_2;

        let output = compute_wrench(&current, &desired, &gains(), &params).unwrap();

        let expected_rd = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        assert_relative_eq!(output.desired_rotation, expected_rd, epsilon = 1e-12);
        assert_relative_eq!(output.wrench.thrust, params.mass * params.gravity, epsilon = 1e-12);
        assert_abs_diff_eq!(output.wrench.torque.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(output.wrench.torque.y, 0.0, epsilon = 1e-12);
        // A positive yaw is missing, so the torque turns the vehicle towards +z.
        assert_relative_eq!(output.wrench.torque.z, gains().kr, epsilon = 1e-12);
    }

    #[test]
    fn attitude_error_uses_current_and_desired_rotation() {
        let params = PhysicalParams::default();
        let (mut current, desired) = hover_pair();
        let roll = 0.1;
        current.orientation = Rotation3::from_axis_angle(&Vector3::x_axis(), roll);

        let output = compute_wrench(&current, &desired, &gains(), &params).unwrap();

        assert_relative_eq!(
            output.errors.er,
            Vector3::new(roll.sin(), 0.0, 0.0),
            epsilon = 1e-12
        );
        // Restoring torque, and only the tilted share of the force counts as thrust.
        assert!(output.wrench.torque.x < 0.0);
        assert_relative_eq!(
            output.wrench.thrust,
            params.mass * params.gravity * roll.cos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn position_error_tilts_desired_thrust_axis_back() {
        let params = PhysicalParams::default();
        let (mut current, desired) = hover_pair();
        current.position = Vector3::new(1.0, 0.0, 0.0);

        let output = compute_wrench(&current, &desired, &gains(), &params).unwrap();
        let b3d = output.desired_rotation.matrix().column(2).into_owned();

        assert_eq!(output.errors.ex, Vector3::new(1.0, 0.0, 0.0));
        assert!(b3d.x < 0.0);
        assert!(b3d.z > 0.0);
    }

    #[test]
    fn gyroscopic_term_is_compensated() {
        let params = PhysicalParams {
            inertia: Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)),
            ..PhysicalParams::default()
        };
        let (mut current, desired) = hover_pair();
        current.angular_velocity = Vector3::new(1.0, 1.0, 0.0);

        let g = gains();
        let output = compute_wrench(&current, &desired, &g, &params).unwrap();

        // omega x (J omega) = (1, 1, 0) x (1, 2, 0) = (0, 0, 1)
        assert_relative_eq!(
            output.wrench.torque,
            Vector3::new(-g.komega, -g.komega, 1.0),
            epsilon = 1e-12
        );
        assert_eq!(output.errors.eomega, current.angular_velocity);
    }

    #[test]
    fn free_fall_reference_is_degenerate() {
        let params = PhysicalParams::default();
        let (current, mut desired) = hover_pair();
        desired.acceleration = -params.gravity * GRAVITY_AXIS;

        assert!(matches!(
            compute_wrench(&current, &desired, &gains(), &params),
            Err(ControlError::DegenerateThrust { .. })
        ));
    }

    #[test]
    fn thrust_axis_parallel_to_heading_is_degenerate() {
        let params = PhysicalParams::default();
        let (current, mut desired) = hover_pair();
        // Cancelling gravity compensation and pushing along +x leaves a
        // horizontal force pointing exactly along the yaw-0 heading.
        desired.acceleration = Vector3::new(5.0, 0.0, -params.gravity);

        assert!(matches!(
            compute_wrench(&current, &desired, &gains(), &params),
            Err(ControlError::DegenerateHeading { .. })
        ));
    }

    #[test]
    fn non_finite_state_never_yields_a_wrench() {
        let params = PhysicalParams::default();
        let (mut current, desired) = hover_pair();
        current.angular_velocity = Vector3::new(f64::NAN, 0.0, 0.0);
        assert_eq!(
            compute_wrench(&current, &desired, &gains(), &params),
            Err(ControlError::NonFinite)
        );

        let (mut current, desired) = hover_pair();
        current.position.x = f64::INFINITY;
        assert!(compute_wrench(&current, &desired, &gains(), &params).is_err());
    }

    #[test]
    fn controller_rejects_invalid_parameters() {
        let bad = PhysicalParams {
            mass: 0.0,
            ..PhysicalParams::default()
        };
        assert!(GeometricController::new(gains(), bad).is_err());

        let controller = GeometricController::new(gains(), PhysicalParams::default()).unwrap();
        let (current, desired) = hover_pair();
        assert_eq!(
            controller.compute(&current, &desired),
            compute_wrench(&current, &desired, &gains(), &PhysicalParams::default())
        );
    }
}
