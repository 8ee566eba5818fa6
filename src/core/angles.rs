//! Planar angle helpers

use nalgebra::{Unit, Vector2};

/// Wrap an angle to `(-π, π]`
pub fn wrap_to_pi(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

/// Vector of the given length pointing along `angle` (radians, CCW from +x)
pub fn angle_to_vector(angle: f64, length: f64) -> Vector2<f64> {
    Vector2::new(length * angle.cos(), length * angle.sin())
}

pub fn unit_from_angle(angle: f64) -> Unit<Vector2<f64>> {
    Unit::new_unchecked(Vector2::new(angle.cos(), angle.sin()))
}

/// Heading of a planar vector, CCW from +x
pub fn heading(v: &Vector2<f64>) -> f64 {
    v.y.atan2(v.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_wrap_to_pi() {
        assert_abs_diff_eq!(wrap_to_pi(0.5), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_to_pi(2.0 * PI + 0.25), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_to_pi(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-12);
        assert!(wrap_to_pi(7.0 * PI).abs() <= PI + 1e-12);
    }

    #[test]
    fn test_angle_to_vector() {
        let v = angle_to_vector(PI / 2.0, 2.0);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(heading(&v), PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(unit_from_angle(1.1).norm(), 1.0, epsilon = 1e-12);
    }
}
