//! Image loading and grayscale conversion.
//!
//! Accepts a file path or raw encoded bytes (JPEG, TIFF, PNG) and produces
//! a single-channel grayscale image. This is the first step of every
//! generator.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::types::MaskError;

/// Rec. 601 luma weights in thousandths, for R, G and B.
const LUMA_WEIGHTS: [u32; 3] = [299, 587, 114];

/// File extensions accepted by the image selection dialog.
///
/// The engine itself does not rely on extensions: decoding sniffs the
/// content, and anything undecodable fails with a load error.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "tif", "tiff", "png"];

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`] (case-insensitive).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Decode raw image bytes and convert to grayscale.
///
/// Colour images are converted with the Rec. 601 luma weights
/// `0.299*R + 0.587*G + 0.114*B`, rounded to nearest. Alpha is dropped
/// and 16-bit samples are scaled to 8 bits first.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] if `bytes` is empty.
/// Returns [`MaskError::ImageDecode`] if the format is unrecognized or the
/// data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, MaskError> {
    if bytes.is_empty() {
        return Err(MaskError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(match img {
        DynamicImage::ImageLuma8(gray) => gray,
        other => rec601_luma(&other.to_rgb8()),
    })
}

/// Weighted sum of the colour channels, rounded to nearest.
#[allow(clippy::cast_possible_truncation)]
fn rec601_luma(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let sum: u32 = rgb
            .get_pixel(x, y)
            .0
            .iter()
            .zip(LUMA_WEIGHTS)
            .map(|(&c, w)| u32::from(c) * w)
            .sum();
        // At most 255 * 1000 + 500, so the quotient fits in u8.
        Luma([((sum + 500) / 1000) as u8])
    })
}

/// Read an image file and convert it to grayscale.
///
/// # Errors
///
/// Returns [`MaskError::ImageRead`] if the file cannot be read, plus the
/// errors of [`decode_and_grayscale`].
pub fn load_grayscale(path: &Path) -> Result<GrayImage, MaskError> {
    let bytes = std::fs::read(path).map_err(|source| MaskError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    decode_and_grayscale(&bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGB image as PNG bytes.
    fn encode_png(img: &image::RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode_and_grayscale(&[]);
        assert!(matches!(result, Err(MaskError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_decode_error() {
        let result = decode_and_grayscale(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(MaskError::ImageDecode(_))));
    }

    #[test]
    fn missing_file_returns_read_error() {
        let result = load_grayscale(Path::new("/nonexistent/specimen.png"));
        assert!(matches!(result, Err(MaskError::ImageRead { .. })));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = image::RgbImage::from_pixel(17, 31, image::Rgb([128, 64, 32]));
        let gray = decode_and_grayscale(&encode_png(&img)).unwrap();
        assert_eq!(gray.width(), 17);
        assert_eq!(gray.height(), 31);
    }

    #[test]
    fn conversion_is_luma_weighted() {
        let pixel = |r, g, b| {
            let img = image::RgbImage::from_pixel(1, 1, image::Rgb([r, g, b]));
            decode_and_grayscale(&encode_png(&img)).unwrap().get_pixel(0, 0).0[0]
        };
        let r = pixel(255, 0, 0);
        let g = pixel(0, 255, 0);
        let b = pixel(0, 0, 255);
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn primaries_use_rec601_weights() {
        let pixel = |r, g, b| {
            let img = image::RgbImage::from_pixel(1, 1, image::Rgb([r, g, b]));
            decode_and_grayscale(&encode_png(&img)).unwrap().get_pixel(0, 0).0[0]
        };
        assert_eq!(pixel(255, 0, 0), 76);
        assert_eq!(pixel(0, 255, 0), 150);
        assert_eq!(pixel(0, 0, 255), 29);
        assert_eq!(pixel(255, 255, 255), 255);
        assert_eq!(pixel(90, 90, 90), 90);
    }

    #[test]
    fn gray_input_is_kept_as_is() {
        let gray = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 7, 128, 255][x as usize]]));
        let mut buf = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray.clone())
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        assert_eq!(decode_and_grayscale(buf.get_ref()).unwrap(), gray);
    }

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported_image(Path::new("a/b/specimen.JPG")));
        assert!(is_supported_image(Path::new("scan.tiff")));
        assert!(is_supported_image(Path::new("scan.png")));
        assert!(!is_supported_image(Path::new("scan.bmp")));
        assert!(!is_supported_image(Path::new("scan")));
    }
}
