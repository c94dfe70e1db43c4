use super::options::LsdOptions;
use super::types::LineSegment;
use crate::angle::{angular_difference, normalize_half_pi};
use crate::edges::{sobel_gradients, Grad};
use crate::image::ImageF32;
use nalgebra::{Matrix2, SymmetricEigen};
use std::time::Instant;

/// Segments extracted from one image together with the gradients they were
/// grown from.
#[derive(Clone, Debug, Default)]
pub struct LsdResult {
    pub segments: Vec<LineSegment>,
    pub grad: Grad,
    pub elapsed_ms: f64,
}

/// Pixel moments of a grown region.
#[derive(Default)]
struct Moments {
    n: usize,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
    aligned: usize,
    mag: f32,
}

impl Moments {
    fn add(&mut self, x: usize, y: usize, mag: f32, aligned: bool) {
        let (xf, yf) = (x as f64, y as f64);
        self.n += 1;
        self.sx += xf;
        self.sy += yf;
        self.sxx += xf * xf;
        self.syy += yf * yf;
        self.sxy += xf * yf;
        self.aligned += usize::from(aligned);
        self.mag += mag;
    }

    fn aligned_fraction(&self) -> f32 {
        if self.n == 0 {
            0.0
        } else {
            self.aligned as f32 / self.n as f32
        }
    }

    fn mean_mag(&self) -> f32 {
        if self.n == 0 {
            0.0
        } else {
            self.mag / self.n as f32
        }
    }

    /// Centroid and unit principal direction of the pixel cloud.
    fn principal_axis(&self) -> Option<([f32; 2], [f32; 2])> {
        if self.n < 2 {
            return None;
        }
        let n = self.n as f64;
        let (cx, cy) = (self.sx / n, self.sy / n);
        let cov = Matrix2::new(
            (self.sxx / n - cx * cx) as f32,
            (self.sxy / n - cx * cy) as f32,
            (self.sxy / n - cx * cy) as f32,
            (self.syy / n - cy * cy) as f32,
        );
        let eig = SymmetricEigen::new(cov);
        let k = if eig.eigenvalues[0] >= eig.eigenvalues[1] { 0 } else { 1 };
        if !(eig.eigenvalues[k] > 0.0) {
            return None;
        }
        let v = eig.eigenvectors.column(k);
        let norm = v.norm();
        if !(norm > 1e-6) {
            return None;
        }
        Some(([cx as f32, cy as f32], [v[0] / norm, v[1] / norm]))
    }
}

/// Region grower over precomputed gradients. `orientation` holds the
/// π-periodic gradient angle of pixels above the magnitude threshold and NaN
/// elsewhere.
struct RegionGrower<'a> {
    grad: &'a Grad,
    orientation: Vec<f32>,
    used: Vec<bool>,
    stack: Vec<usize>,
    pixels: Vec<usize>,
    angle_tol: f32,
    min_len: f32,
    min_region: usize,
    min_aligned: f32,
}

impl<'a> RegionGrower<'a> {
    fn new(grad: &'a Grad, options: &LsdOptions) -> Self {
        let (w, h) = (grad.mag.w, grad.mag.h);
        let orientation = grad
            .mag
            .data
            .iter()
            .zip(grad.gx.data.iter().zip(&grad.gy.data))
            .map(|(&m, (&gx, &gy))| {
                if m >= options.magnitude_threshold {
                    normalize_half_pi(gy.atan2(gx))
                } else {
                    f32::NAN
                }
            })
            .collect();
        Self {
            grad,
            orientation,
            used: vec![false; w * h],
            stack: Vec::with_capacity(64),
            pixels: Vec::with_capacity(128),
            angle_tol: options.angle_tolerance_deg.to_radians(),
            min_len: options.min_length_for(w, h),
            min_region: options.min_region_size.max(2),
            min_aligned: options.min_aligned_fraction,
        }
    }

    fn run(mut self) -> Vec<LineSegment> {
        let mut segments = Vec::new();
        for seed in 0..self.orientation.len() {
            if self.used[seed] || self.orientation[seed].is_nan() {
                continue;
            }
            // Rejected regions stay consumed.
            let moments = self.grow(seed);
            segments.extend(self.fit(&moments));
        }
        segments
    }

    /// 8-connected growth from `seed`. Neighbours join while their
    /// orientation stays within the tolerance of the seed; pixels within half
    /// the tolerance count as aligned.
    fn grow(&mut self, seed: usize) -> Moments {
        let w = self.grad.mag.w;
        let h = self.grad.mag.h;
        let seed_angle = self.orientation[seed];
        let mut moments = Moments::default();
        self.pixels.clear();
        self.used[seed] = true;
        self.stack.push(seed);
        while let Some(idx) = self.stack.pop() {
            let (x, y) = (idx % w, idx / w);
            let diff = angular_difference(self.orientation[idx], seed_angle);
            moments.add(x, y, self.grad.mag.data[idx], diff <= 0.5 * self.angle_tol);
            self.pixels.push(idx);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if self.used[n] {
                        continue;
                    }
                    let a = self.orientation[n];
                    if !a.is_nan() && angular_difference(a, seed_angle) <= self.angle_tol {
                        self.used[n] = true;
                        self.stack.push(n);
                    }
                }
            }
        }
        moments
    }

    /// PCA line through the region, endpoints from the extreme projections.
    fn fit(&self, moments: &Moments) -> Option<LineSegment> {
        if moments.n < self.min_region || moments.aligned_fraction() < self.min_aligned {
            return None;
        }
        let (c, t) = moments.principal_axis()?;
        let w = self.grad.mag.w;
        let (smin, smax) = self.pixels.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &idx| {
            let s = ((idx % w) as f32 - c[0]) * t[0] + ((idx / w) as f32 - c[1]) * t[1];
            (lo.min(s), hi.max(s))
        });
        let len = smax - smin;
        if !(len.is_finite() && len > 0.0 && len >= self.min_len) {
            return None;
        }
        let avg_mag = moments.mean_mag();
        Some(LineSegment {
            p0: [c[0] + smin * t[0], c[1] + smin * t[1]],
            p1: [c[0] + smax * t[0], c[1] + smax * t[1]],
            avg_mag,
            strength: len * avg_mag.max(1e-3),
        })
    }
}

/// Gradients, region growth and line fitting over a whole image.
pub(super) fn extract(l: &ImageF32, options: &LsdOptions) -> LsdResult {
    let started = Instant::now();
    let grad = sobel_gradients(l);
    let segments = if l.w == 0 || l.h == 0 {
        Vec::new()
    } else {
        RegionGrower::new(&grad, options).run()
    };
    LsdResult {
        segments,
        grad,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    }
}
