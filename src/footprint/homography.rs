use nalgebra::{Matrix3, Vector3};

const EPS: f32 = 1e-9;

/// Image-to-ground map in normalized image coordinates:
/// `x = (u - 0.5) * S`, `y = (0.5 - v) * S * k`.
///
/// `S` is the assumed scene width across the image and `k` compresses the
/// vertical image axis to approximate depth foreshortening.
pub fn simplified_ground_homography(scene_width: f32, depth_compression: f32) -> Matrix3<f32> {
    let s = scene_width;
    let k = depth_compression;
    Matrix3::new(
        s, 0.0, -0.5 * s, //
        0.0, -s * k, 0.5 * s * k, //
        0.0, 0.0, 1.0,
    )
}

/// Ground-plane homography for a camera whose horizon lies on the normalized
/// row `horizon_v`.
///
/// Below the horizon the depth is `A / (v - horizon_v) + B` and the lateral
/// scale falls off as `1 / (v - horizon_v)`. Both scales agree with
/// [`simplified_ground_homography`] on the bottom image row. `None` when the
/// horizon is at or below the bottom row.
pub fn perspective_ground_homography(
    scene_width: f32,
    depth_compression: f32,
    horizon_v: f32,
) -> Option<Matrix3<f32>> {
    let d = 1.0 - horizon_v;
    if !(d.is_finite() && d > EPS) {
        return None;
    }
    let (s, k) = (scene_width, depth_compression);
    let a = s * k * d * d;
    let b = -s * k * (0.5 + d);
    Some(Matrix3::new(
        s * d, 0.0, -0.5 * s * d, //
        0.0, b, a - b * horizon_v, //
        0.0, 1.0, -horizon_v,
    ))
}

/// Maps points through `h` with perspective division. Fails when a point
/// lands at infinity.
pub fn apply_homography_points(h: &Matrix3<f32>, pts: &[[f32; 2]]) -> Option<Vec<[f32; 2]>> {
    let mut out = Vec::with_capacity(pts.len());
    for &p in pts {
        let v = h * Vector3::new(p[0], p[1], 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() <= EPS || !v[0].is_finite() || !v[1].is_finite() {
            return None;
        }
        out.push([v[0] / w, v[1] / w]);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_image_centre_to_origin() {
        let h = simplified_ground_homography(100.0, 0.6);
        let pts = apply_homography_points(&h, &[[0.5, 0.5], [1.0, 0.0], [0.0, 1.0]]).unwrap();
        assert!(pts[0][0].abs() < 1e-5 && pts[0][1].abs() < 1e-5);
        assert!((pts[1][0] - 50.0).abs() < 1e-4 && (pts[1][1] - 30.0).abs() < 1e-4);
        assert!((pts[2][0] + 50.0).abs() < 1e-4 && (pts[2][1] + 30.0).abs() < 1e-4);
    }

    #[test]
    fn perspective_map_matches_affine_on_bottom_row() {
        let h = perspective_ground_homography(100.0, 0.6, 0.5).unwrap();
        let pts = apply_homography_points(&h, &[[0.5, 1.0], [1.0, 1.0], [1.0, 0.75]]).unwrap();
        assert!(pts[0][0].abs() < 1e-4 && (pts[0][1] + 30.0).abs() < 1e-4);
        assert!((pts[1][0] - 50.0).abs() < 1e-4);
        // Half way to the horizon: twice the lateral scale.
        assert!((pts[2][0] - 100.0).abs() < 1e-3 && pts[2][1].abs() < 1e-3, "{:?}", pts[2]);
        assert!(apply_homography_points(&h, &[[0.5, 0.5]]).is_none());
        assert!(perspective_ground_homography(100.0, 0.6, 1.0).is_none());
    }

    #[test]
    fn rejects_points_at_infinity() {
        let mut h = Matrix3::identity();
        h[(2, 2)] = 0.0;
        assert!(apply_homography_points(&h, &[[0.0, 0.0]]).is_none());
    }
}
