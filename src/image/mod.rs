//! Image containers used by the pipeline.
//!
//! - [`SourceImage`]: the decoded input photograph/sketch. Immutable; provides
//!   a normalized grayscale [`ImageF32`] for detection and PNG crops for the
//!   region verifier.
//! - [`ImageF32`]: owned single-channel float buffer used by the gradient and
//!   segment stages.

pub mod f32;
pub mod io;
pub mod source;

pub use self::f32::ImageF32;
pub use self::source::SourceImage;
