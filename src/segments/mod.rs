//! Line segment detection (LSD-like) tuned for drawn and photographed
//! façades.
//!
//! - Sobel gradients from `edges::sobel_gradients`.
//! - Region growing: 8-connected pixels above the magnitude threshold whose
//!   orientation stays within a tolerance of the seed.
//! - PCA fit: region moments give the principal direction; the extreme
//!   projections onto it give the endpoints `p0` and `p1`.
//! - Significance: minimum region size, minimum length relative to the
//!   shorter image side, minimum fraction of aligned pixels.
//! - Stroke merging: collinear fragments of one hand-drawn line are joined
//!   and the output is ordered by strength.
//!
//! Orientation is taken modulo π: the vanishing-point stage only cares about
//! the supporting line, not its direction.
//!
//! Complexity: region growing visits each pixel at most once, O(W·H).

mod extractor;
mod merge;
mod options;
mod types;

pub use extractor::LsdResult;
pub use options::LsdOptions;
pub use types::LineSegment;

use crate::image::ImageF32;
use log::debug;
use merge::{merge_collinear, MergeTolerance};

/// Extracts line segments, joins broken strokes and keeps the strongest
/// `max_segments`.
pub fn lsd_extract_segments(l: &ImageF32, options: LsdOptions) -> LsdResult {
    let mut result = extractor::extract(l, &options);
    let grown = result.segments.len();
    if options.merge_strokes && grown > 1 {
        let tol = MergeTolerance {
            angle_deg: options.merge_angle_deg,
            offset_px: options.merge_offset_px,
            gap_px: options.merge_gap_px,
        };
        result.segments = merge_collinear(std::mem::take(&mut result.segments), &tol);
    } else {
        result.segments.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    }
    if options.max_segments > 0 {
        result.segments.truncate(options.max_segments);
    }
    debug!(
        "LSD: {}x{} grown={} segments={} elapsed_ms={:.3}",
        l.w,
        l.h,
        grown,
        result.segments.len(),
        result.elapsed_ms
    );
    result
}
