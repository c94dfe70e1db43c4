//! Image gradients and binary edge maps.
//!
//! Sobel gradients feed the segment extractor; thresholded magnitude maps
//! feed the edge-density region proposer. Borders replicate the outermost
//! pixels.

pub mod grad;

pub use grad::{edge_mask, sobel_gradients, Grad};
