//! Image Preparer: load, convert to grayscale, blur.
//!
//! Every generator starts from the same prepared raster so thresholds and
//! edge detection see identical input for identical blur settings.

use std::path::Path;

use image::GrayImage;

use crate::blur::gaussian_blur;
use crate::config::KernelSize;
use crate::grayscale::{decode_and_grayscale, load_grayscale};
use crate::types::MaskError;

/// Load the image at `path` and return its blurred grayscale raster.
///
/// # Errors
///
/// Returns a load error ([`MaskError::is_load_error`]) if the file cannot
/// be read or decoded.
pub fn prepare_image(path: &Path, blur_size: KernelSize) -> Result<GrayImage, MaskError> {
    let gray = load_grayscale(path)?;
    Ok(prepare_gray(&gray, blur_size))
}

/// Decode an in-memory encoded image and return its blurred grayscale
/// raster.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] for empty input or
/// [`MaskError::ImageDecode`] if the bytes are not a supported format.
pub fn prepare_bytes(bytes: &[u8], blur_size: KernelSize) -> Result<GrayImage, MaskError> {
    let gray = decode_and_grayscale(bytes)?;
    Ok(prepare_gray(&gray, blur_size))
}

/// Blur an already grayscale raster.
#[must_use = "returns the prepared raster"]
pub fn prepare_gray(gray: &GrayImage, blur_size: KernelSize) -> GrayImage {
    gaussian_blur(gray, blur_size)
}
