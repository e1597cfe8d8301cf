//! Error types
//!
//! Only input shapes can fail. Everything inside the stepping loop degrades
//! silently instead of returning errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Image has zero size ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("Image buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    ImageSize {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to parse settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
