//! Shared types for the specmask mask generation engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hold masks and
/// intermediate rasters without depending on `image` directly.
pub use image::GrayImage;

/// Foreground sample value of every mask returned by the engine.
pub const FOREGROUND: u8 = 255;

/// Background sample value of every mask returned by the engine.
pub const BACKGROUND: u8 = 0;

/// A 2D integer point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Errors that can occur while generating a mask.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// The image file could not be read from disk.
    #[error("failed to read image {}: {source}", path.display())]
    ImageRead {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The image data could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image data was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A configuration value is outside its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Contour reduction was requested but the mask has no outer contour.
    #[error("no outer contour found in the mask")]
    NoContourFound,

    /// The generation was cancelled before it finished.
    #[error("mask generation was cancelled")]
    Cancelled,

    /// The background worker could not be started or went away.
    #[error("mask worker failed: {0}")]
    Worker(String),
}

impl MaskError {
    /// Whether this error means the source image could not be loaded.
    ///
    /// Groups [`ImageRead`](Self::ImageRead),
    /// [`ImageDecode`](Self::ImageDecode) and
    /// [`EmptyInput`](Self::EmptyInput).
    #[must_use]
    pub const fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::ImageRead { .. } | Self::ImageDecode(_) | Self::EmptyInput
        )
    }
}
