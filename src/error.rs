//! Error types for the fallible boundaries of the crate.
//!
//! The pipeline stages themselves never fail: degenerate geometry, verifier
//! outages and empty inputs are folded into the scene's confidence and
//! flags. Only work that happens before the pipeline starts (decoding the
//! input image, reading configuration) or after it ends (writing outputs)
//! returns an [`Error`].

use std::path::PathBuf;
use thiserror::Error;

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("image has zero extent ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid analysis payload: {0}")]
    InvalidAnalysis(String),
}

pub type Result<T> = std::result::Result<T, Error>;
