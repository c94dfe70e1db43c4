//! I/O helpers for input images and JSON/text outputs.
//!
//! - `load_source_image`: read a PNG/JPEG from disk into a [`SourceImage`].
//! - `read_json_file`: deserialize a JSON document from disk.
//! - `write_json_file`: pretty-print a serializable value to disk.
//! - `write_text_file`: write a rendered script to disk.
use super::SourceImage;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image file from disk.
pub fn load_source_image(path: &Path) -> Result<SourceImage> {
    let bytes = fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    SourceImage::decode(&bytes)
}

/// Read and deserialize a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| Error::Json {
        context: path.display().to_string(),
        source,
    })
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
        context: path.display().to_string(),
        source,
    })?;
    write_text_file(path, &json)
}

/// Write text to `path`, creating parent directories.
pub fn write_text_file(path: &Path, text: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, text).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
