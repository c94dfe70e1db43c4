//! Angle utilities used across the reconstruction pipeline.
//!
//! Segment orientation is undirected: a segment from `p0` to `p1` and its
//! reverse describe the same line. The helpers below fold angles into
//! `[0, π)` (or `[0°, 180°)`) and compare them modulo π.

/// Normalizes an angle into the range [0, π).
#[inline]
pub fn normalize_half_pi(angle: f32) -> f32 {
    let mut norm = angle.rem_euclid(std::f32::consts::PI);
    if norm >= std::f32::consts::PI {
        norm -= std::f32::consts::PI;
    }
    if norm >= std::f32::consts::PI - 1e-6 {
        0.0
    } else {
        norm
    }
}

/// Computes the smallest unsigned angular difference between two angles,
/// treating antipodal directions as equivalent (i.e. π apart → 0).
#[inline]
pub fn angular_difference(a: f32, b: f32) -> f32 {
    let mut diff = (a - b).abs();
    if diff > std::f32::consts::PI {
        diff = diff.rem_euclid(std::f32::consts::PI);
    }
    if diff > std::f32::consts::FRAC_PI_2 {
        std::f32::consts::PI - diff
    } else {
        diff
    }
}

/// Normalizes an angle in degrees into [0, 180).
#[inline]
pub fn normalize_half_turn_deg(angle_deg: f32) -> f32 {
    normalize_half_pi(angle_deg.to_radians()).to_degrees().rem_euclid(180.0)
}

/// Signed difference `a - b` in degrees folded into (-90, 90], for undirected
/// orientations.
#[inline]
pub fn signed_difference_deg(a: f32, b: f32) -> f32 {
    let mut diff = (a - b).rem_euclid(180.0);
    if diff > 90.0 {
        diff -= 180.0;
    }
    diff
}

/// Unsigned orientation difference in degrees, in [0, 90].
#[inline]
pub fn difference_deg(a: f32, b: f32) -> f32 {
    signed_difference_deg(a, b).abs()
}

/// True when an undirected orientation (degrees) lies within `tol_deg` of the
/// image x-axis.
#[inline]
pub fn is_horizontal_deg(angle_deg: f32, tol_deg: f32) -> bool {
    difference_deg(angle_deg, 0.0) < tol_deg
}

/// True when an undirected orientation (degrees) lies within `tol_deg` of the
/// image y-axis.
#[inline]
pub fn is_vertical_deg(angle_deg: f32, tol_deg: f32) -> bool {
    difference_deg(angle_deg, 90.0) < tol_deg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn normalize_half_pi_basic() {
        assert!(approx_eq(normalize_half_pi(0.5), 0.5));
        assert!(approx_eq(
            normalize_half_pi(-std::f32::consts::FRAC_PI_4),
            3.0 * std::f32::consts::FRAC_PI_4
        ));
        assert!(approx_eq(normalize_half_pi(std::f32::consts::PI), 0.0));
    }

    #[test]
    fn angular_difference_handles_wrap() {
        assert!(approx_eq(
            angular_difference(0.0, std::f32::consts::PI),
            0.0
        ));
        assert!(approx_eq(
            angular_difference(0.0, std::f32::consts::FRAC_PI_2),
            std::f32::consts::FRAC_PI_2
        ));
    }

    #[test]
    fn degree_differences_fold_modulo_half_turn() {
        assert!(approx_eq(signed_difference_deg(179.0, 1.0), -2.0));
        assert!(approx_eq(signed_difference_deg(1.0, 179.0), 2.0));
        assert!(approx_eq(difference_deg(45.0, 135.0), 90.0));
        assert!(approx_eq(normalize_half_turn_deg(-10.0), 170.0));
        assert!(approx_eq(normalize_half_turn_deg(190.0), 10.0));
    }

    #[test]
    fn horizontal_and_vertical_classification() {
        assert!(is_horizontal_deg(10.0, 45.0));
        assert!(is_horizontal_deg(170.0, 45.0));
        assert!(!is_horizontal_deg(90.0, 45.0));
        assert!(is_vertical_deg(95.0, 20.0));
        assert!(!is_vertical_deg(30.0, 20.0));
    }
}
