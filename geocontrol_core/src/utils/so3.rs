// geocontrol_core/src/utils/so3.rs

use nalgebra::{Matrix3, Vector3};
use num_traits::Float;

/// Skew-symmetric matrix of `v` (the hat map), so that `hat(a) * b == a x b`.
///
/// ```text
/// [v]x = [ 0  -z   y]
///        [ z   0  -x]
///        [-y   x   0]
/// ```
pub fn hat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

/// Inverse of [`hat`]: reads the axis vector out of a skew-symmetric matrix
/// as `(S(2,1), S(0,2), S(1,0))`. Only those three entries are read, so `m`
/// is expected to be skew-symmetric already.
pub fn vee(m: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(m[(2, 1)], m[(0, 2)], m[(1, 0)])
}

/// `sign(x) * sqrt(|x|)`.
///
/// Rotor thrust is proportional to the square of the signed rotor speed, so this
/// turns a thrust-equivalent back into a speed while keeping the spin direction.
pub fn signed_sqrt<T: Float>(x: T) -> T {
    if x >= T::zero() {
        x.sqrt()
    } else {
        -(-x).sqrt()
    }
}

/// Inverse of [`signed_sqrt`]: `sign(x) * x^2`.
pub fn signed_square<T: Float>(x: T) -> T {
    x * x.abs()
}
