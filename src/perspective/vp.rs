use crate::segments::LineSegment;
use log::debug;
use nalgebra::{Matrix2, Vector2, Vector3};

/// Refines a RANSAC hypothesis on its inliers: the point with the least
/// strength-weighted squared distance to every inlier's supporting line.
///
/// Nearly parallel inliers have no finite solution; they refine to the point
/// at infinity along their weighted mean direction.
pub(crate) fn refine_vp(segs: &[LineSegment], inliers: &[usize]) -> Option<Vector3<f32>> {
    if inliers.is_empty() {
        return None;
    }
    let mut normal = Matrix2::<f32>::zeros();
    let mut rhs = Vector2::<f32>::zeros();
    for &idx in inliers {
        let s = &segs[idx];
        let l = s.line();
        let n = Vector2::new(l[0], l[1]);
        let w = s.strength.max(1.0);
        normal += w * n * n.transpose();
        rhs -= w * l[2] * n;
    }
    let scale = normal.trace();
    if normal.determinant().abs() <= 1e-6f32.max(1e-6 * scale * scale) {
        debug!(
            "VP: {} inliers nearly parallel, refined to a direction at infinity",
            inliers.len()
        );
        let dir = mean_direction(segs, inliers);
        return Some(Vector3::new(dir[0], dir[1], 0.0));
    }
    let v = normal.try_inverse()? * rhs;
    Some(Vector3::new(v[0], v[1], 1.0))
}

/// Strength-weighted mean of undirected segment directions.
fn mean_direction(segs: &[LineSegment], indices: &[usize]) -> [f32; 2] {
    let reference = segs[indices[0]].direction();
    let mut sum = [0.0f32; 2];
    for &idx in indices {
        let mut d = segs[idx].direction();
        if d[0] * reference[0] + d[1] * reference[1] < 0.0 {
            d = [-d[0], -d[1]];
        }
        let w = segs[idx].strength.max(1.0);
        sum[0] += w * d[0];
        sum[1] += w * d[1];
    }
    let norm = (sum[0] * sum[0] + sum[1] * sum[1]).sqrt().max(1e-9);
    [sum[0] / norm, sum[1] / norm]
}

#[cfg(test)]
mod tests {
    use super::refine_vp;
    use crate::segments::LineSegment;
    use nalgebra::Vector3;

    fn approx_vec(a: &Vector3<f32>, b: &Vector3<f32>) -> bool {
        (a - b).norm() < 1e-2
    }

    #[test]
    fn finite_intersection() {
        let segs = vec![
            LineSegment::new([10.0, 0.0], [10.0, 40.0]),
            LineSegment::new([0.0, 20.0], [40.0, 20.0]),
        ];
        let vp = refine_vp(&segs, &[0, 1]).expect("vp");
        assert!(approx_vec(&vp, &Vector3::new(10.0, 20.0, 1.0)));
    }

    #[test]
    fn fallback_direction_when_parallel() {
        let segs = vec![
            LineSegment::new([0.0, 5.0], [30.0, 5.0]),
            LineSegment::new([30.0, 15.0], [0.0, 15.0]),
        ];
        let vp = refine_vp(&segs, &[0, 1]).expect("vp");
        assert!(vp[2].abs() < 1e-6);
        assert!((vp[0].abs() - 1.0).abs() < 1e-4);
        assert!(vp[1].abs() < 1e-4);
    }
}
