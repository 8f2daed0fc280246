//! Small geometric helpers shared by criteria, slicing and association.

use std::f64::consts::PI;

/// Transverse radius `sqrt(x² + y²)`.
#[inline]
pub fn rho(p: [f64; 3]) -> f64 {
    p[0].hypot(p[1])
}

/// Azimuth in `[-π, π]`.
#[inline]
pub fn phi(p: [f64; 3]) -> f64 {
    p[1].atan2(p[0])
}

/// Polar angle measured from +z, in `[0, π]`.
#[inline]
pub fn theta(p: [f64; 3]) -> f64 {
    rho(p).atan2(p[2])
}

/// Wrap an angle difference into `(-π, π]`.
pub fn wrap_angle(mut a: f64) -> f64 {
    if !a.is_finite() {
        return a;
    }
    a %= 2.0 * PI;
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Absolute azimuthal separation, aware of the ±π branch cut.
#[inline]
pub fn delta_phi(a: f64, b: f64) -> f64 {
    wrap_angle(a - b).abs()
}

#[inline]
pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Radius of the circle through three points in the xy plane.
///
/// Returns `None` when the points are (numerically) collinear.
pub fn circle_radius_xy(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Option<f64> {
    let ab = (b[0] - a[0]).hypot(b[1] - a[1]);
    let bc = (c[0] - b[0]).hypot(c[1] - b[1]);
    let ca = (a[0] - c[0]).hypot(a[1] - c[1]);
    let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
    let area2 = cross.abs();
    let scale = (ab * bc * ca).max(f64::MIN_POSITIVE);
    if area2 <= 1e-12 * scale.cbrt().powi(2) {
        return None;
    }
    Some(ab * bc * ca / (2.0 * area2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn wrap_angle_crosses_branch_cut() {
        assert_abs_diff_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_phi(PI - 0.01, -PI + 0.01), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn circle_through_three_points() {
        let r = circle_radius_xy([1.0, 0.0, 0.0], [0.0, 1.0, 5.0], [-1.0, 0.0, 9.0])
            .expect("non-collinear");
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
        assert!(circle_radius_xy([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 2.0, 0.0]).is_none());
    }
}
