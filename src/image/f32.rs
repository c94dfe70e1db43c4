//! Grayscale working buffer for the gradient and segment stages.

/// Row-major single-channel image, intensities in [0, 1].
#[derive(Clone, Debug, Default)]
pub struct ImageF32 {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Black image of `w × h` pixels.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    /// Normalizes packed 8-bit luma samples; missing samples stay black.
    pub fn from_luma8(w: usize, h: usize, gray: &[u8]) -> Self {
        let mut img = Self::new(w, h);
        for (dst, &v) in img.data.iter_mut().zip(gray) {
            *dst = f32::from(v) / 255.0;
        }
        img
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.w + x] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.w..(y + 1) * self.w]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.w..(y + 1) * self.w]
    }
}
