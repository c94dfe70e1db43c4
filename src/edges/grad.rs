//! Sobel gradients with clamped borders.
//!
//! The 3×3 kernels are applied separably: a `[1, 2, 1]` smoothing across the
//! derivative axis and a `[-1, 0, 1]` central difference along it.
use crate::image::ImageF32;

/// Per-pixel gradient buffers of one image.
#[derive(Clone, Debug, Default)]
pub struct Grad {
    /// Horizontal derivative.
    pub gx: ImageF32,
    /// Vertical derivative.
    pub gy: ImageF32,
    /// `sqrt(gx² + gy²)`.
    pub mag: ImageF32,
}

impl Grad {
    pub fn width(&self) -> usize {
        self.mag.w
    }

    pub fn height(&self) -> usize {
        self.mag.h
    }
}

/// Sobel gradients of a single-channel image.
pub fn sobel_gradients(l: &ImageF32) -> Grad {
    let (w, h) = (l.w, l.h);
    let mut grad = Grad {
        gx: ImageF32::new(w, h),
        gy: ImageF32::new(w, h),
        mag: ImageF32::new(w, h),
    };
    if w == 0 || h == 0 {
        return grad;
    }

    // Vertical pass: smoothed and differenced columns.
    let mut smooth_v = ImageF32::new(w, h);
    let mut diff_v = ImageF32::new(w, h);
    for y in 0..h {
        let (up, mid, down) = (l.row(y.saturating_sub(1)), l.row(y), l.row((y + 1).min(h - 1)));
        let (s, d) = (smooth_v.row_mut(y), diff_v.row_mut(y));
        for x in 0..w {
            s[x] = up[x] + 2.0 * mid[x] + down[x];
        }
        for x in 0..w {
            d[x] = down[x] - up[x];
        }
    }

    // Horizontal pass.
    for y in 0..h {
        let (s, d) = (smooth_v.row(y), diff_v.row(y));
        for x in 0..w {
            let (xl, xr) = (x.saturating_sub(1), (x + 1).min(w - 1));
            let gx = s[xr] - s[xl];
            let gy = d[xl] + 2.0 * d[x] + d[xr];
            grad.gx.set(x, y, gx);
            grad.gy.set(x, y, gy);
            grad.mag.set(x, y, gx.hypot(gy));
        }
    }
    grad
}

/// Binary edge map (1 = edge) from a gradient magnitude threshold.
pub fn edge_mask(grad: &Grad, mag_thresh: f32) -> Vec<u8> {
    grad.mag
        .data
        .iter()
        .map(|&m| u8::from(m >= mag_thresh))
        .collect()
}
