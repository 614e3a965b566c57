//! Asset loading: cached file access and texture decoding.

pub mod file_cache;
pub mod texture;

pub use file_cache::FileCache;
pub use texture::TextureData;

use std::path::PathBuf;
use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Reading a file from disk failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Decoding an image file failed
    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        /// Path that could not be decoded
        path: PathBuf,
        /// Underlying decoder error
        source: image::ImageError,
    },
}
