use serde::{Deserialize, Serialize};

/// Region growth and stroke merging parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LsdOptions {
    /// Minimum Sobel magnitude of region pixels (image in [0, 1]).
    pub magnitude_threshold: f32,
    /// Orientation tolerance around the seed, degrees.
    pub angle_tolerance_deg: f32,
    /// Minimum length as a fraction of the shorter image side.
    pub min_length_frac: f32,
    /// Lower bound on the minimum length in pixels.
    pub min_length_px: f32,
    pub min_region_size: usize,
    /// Fraction of region pixels within half the tolerance of the seed.
    pub min_aligned_fraction: f32,
    /// Join collinear fragments of one stroke.
    pub merge_strokes: bool,
    pub merge_angle_deg: f32,
    pub merge_offset_px: f32,
    pub merge_gap_px: f32,
    /// Keep only the strongest segments; 0 keeps all.
    pub max_segments: usize,
}

impl Default for LsdOptions {
    fn default() -> Self {
        Self {
            magnitude_threshold: 0.25,
            angle_tolerance_deg: 22.5,
            min_length_frac: 0.02,
            min_length_px: 8.0,
            min_region_size: 12,
            min_aligned_fraction: 0.6,
            merge_strokes: true,
            merge_angle_deg: 3.0,
            merge_offset_px: 1.5,
            merge_gap_px: 4.0,
            max_segments: 2000,
        }
    }
}

impl LsdOptions {
    /// Effective minimum length in pixels for an image of the given size.
    pub fn min_length_for(&self, width: usize, height: usize) -> f32 {
        let short_side = width.min(height) as f32;
        (short_side * self.min_length_frac).max(self.min_length_px)
    }
}
