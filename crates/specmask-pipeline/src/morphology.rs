//! Morphological noise removal on binary masks.
//!
//! Structuring elements are rendered as small rasters and handed to
//! `imageproc::morphology` as a [`Mask`]. Neighbours that fall outside the
//! image never contribute: dilation takes the maximum and erosion the
//! minimum over in-bounds samples only, so the image border neither grows
//! nor erodes the mask.

use image::{GrayImage, Luma};
use imageproc::morphology::{
    Mask, grayscale_close, grayscale_dilate, grayscale_erode, grayscale_open,
};

use crate::config::KernelSize;
use crate::types::{BACKGROUND, FOREGROUND, MaskError};

/// A structuring element anchored at its center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    shape: GrayImage,
    mask: Mask,
}

impl StructuringElement {
    /// Ellipse inscribed in a `size x size` square.
    ///
    /// Row half-widths are `round(r * sqrt(1 - (dy / r)^2))` with
    /// `r = size / 2`, which gives a cross for size 3 and a single pixel
    /// for size 1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn ellipse(size: KernelSize) -> Self {
        let r = size.radius();
        let rf = f64::from(r);
        let half_widths: Vec<u32> = (0..size.get())
            .map(|row| {
                if r == 0 {
                    return 0;
                }
                let dy = f64::from(row) - rf;
                (rf * (1.0 - (dy * dy) / (rf * rf)).sqrt()).round() as u32
            })
            .collect();
        let shape = GrayImage::from_fn(size.get(), size.get(), |x, y| {
            let inside = x.abs_diff(r) <= half_widths[y as usize];
            Luma([if inside { FOREGROUND } else { BACKGROUND }])
        });
        Self::from_shape(shape, r)
    }

    /// Full `size x size` square.
    #[must_use]
    pub fn square(size: KernelSize) -> Self {
        let shape = GrayImage::from_pixel(size.get(), size.get(), Luma([FOREGROUND]));
        Self::from_shape(shape, size.radius())
    }

    fn from_shape(shape: GrayImage, radius: u32) -> Self {
        // KernelSize caps the side at 511, so the radius fits.
        let center = u8::try_from(radius).unwrap_or(u8::MAX);
        let mask = Mask::from_image(&shape, center, center);
        Self { shape, mask }
    }

    /// Number of pixels covered by the element.
    #[must_use]
    pub fn area(&self) -> usize {
        self.shape.pixels().filter(|p| p.0[0] != BACKGROUND).count()
    }

    /// Covered pixels per row, top to bottom.
    #[must_use]
    pub fn row_widths(&self) -> Vec<usize> {
        self.shape
            .rows()
            .map(|row| row.filter(|p| p.0[0] != BACKGROUND).count())
            .collect()
    }
}

/// Grayscale dilation: each pixel becomes the maximum under the element.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    if is_empty(image) {
        return image.clone();
    }
    grayscale_dilate(image, &element.mask)
}

/// Grayscale erosion: each pixel becomes the minimum under the element.
#[must_use = "returns the eroded image"]
pub fn erode(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    if is_empty(image) {
        return image.clone();
    }
    grayscale_erode(image, &element.mask)
}

/// Remove speckle noise from a binary mask.
///
/// Closing first merges nearby fragments and fills small gaps, then
/// opening strips isolated specks. Both use an elliptical element of
/// `kernel_size`.
#[must_use = "returns the denoised mask"]
pub fn denoise(binary: &GrayImage, kernel_size: KernelSize) -> GrayImage {
    if is_empty(binary) {
        return binary.clone();
    }
    let element = StructuringElement::ellipse(kernel_size);
    grayscale_open(&grayscale_close(binary, &element.mask), &element.mask)
}

fn is_empty(image: &GrayImage) -> bool {
    image.width() == 0 || image.height() == 0
}

/// [`denoise`] with an unchecked kernel size, for callers holding raw
/// integers.
///
/// # Errors
///
/// Returns [`MaskError::InvalidParameter`] if `kernel_size` is zero, even
/// or above [`KernelSize::MAX`].
pub fn denoise_raw(binary: &GrayImage, kernel_size: u32) -> Result<GrayImage, MaskError> {
    Ok(denoise(binary, KernelSize::new(kernel_size)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn size(n: u32) -> KernelSize {
        KernelSize::new(n).unwrap()
    }

    fn filled_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    fn count_foreground(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p.0[0] != 0).count()
    }

    #[test]
    fn ellipse_three_is_a_cross() {
        let element = StructuringElement::ellipse(size(3));
        assert_eq!(element.area(), 5);
    }

    #[test]
    fn ellipse_five_matches_reference_shape() {
        // Rows: 1, 5, 5, 5, 1 pixels wide.
        let element = StructuringElement::ellipse(size(5));
        assert_eq!(element.row_widths(), vec![1, 5, 5, 5, 1]);
    }

    #[test]
    fn ellipse_one_is_identity() {
        let element = StructuringElement::ellipse(KernelSize::ONE);
        assert_eq!(element.area(), 1);
        let img = filled_rect(10, 10, 2, 2, 5, 7);
        assert_eq!(dilate(&img, &element), img);
        assert_eq!(erode(&img, &element), img);
    }

    #[test]
    fn ellipse_three_rows() {
        let element = StructuringElement::ellipse(size(3));
        assert_eq!(element.row_widths(), vec![1, 3, 1]);
    }

    #[test]
    fn large_elements_are_supported() {
        let element = StructuringElement::ellipse(KernelSize::MAX);
        assert_eq!(element.row_widths().len(), 511);
        let img = GrayImage::new(4, 4);
        assert_eq!(denoise(&img, KernelSize::MAX), img);
    }

    #[test]
    fn square_area() {
        assert_eq!(StructuringElement::square(size(3)).area(), 9);
        assert_eq!(StructuringElement::square(size(5)).area(), 25);
    }

    #[test]
    fn dilate_single_pixel_with_square() {
        let mut img = GrayImage::new(7, 7);
        img.put_pixel(3, 3, image::Luma([255]));
        let dilated = dilate(&img, &StructuringElement::square(size(3)));
        assert_eq!(count_foreground(&dilated), 9);
        assert_eq!(dilated.get_pixel(2, 2).0[0], 255);
        assert_eq!(dilated.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn erode_removes_single_pixel() {
        let mut img = GrayImage::new(7, 7);
        img.put_pixel(3, 3, image::Luma([255]));
        let eroded = erode(&img, &StructuringElement::ellipse(size(3)));
        assert_eq!(count_foreground(&eroded), 0);
    }

    #[test]
    fn border_does_not_erode_full_image() {
        let img = GrayImage::from_pixel(6, 6, image::Luma([255]));
        let eroded = erode(&img, &StructuringElement::ellipse(size(5)));
        assert_eq!(eroded, img);
    }

    #[test]
    fn denoise_removes_isolated_speck() {
        let mut img = filled_rect(30, 30, 5, 5, 20, 20);
        img.put_pixel(26, 26, image::Luma([255]));
        let cleaned = denoise(&img, size(3));
        assert_eq!(cleaned.get_pixel(26, 26).0[0], 0);
        assert_eq!(cleaned.get_pixel(12, 12).0[0], 255);
    }

    #[test]
    fn denoise_fills_pinhole() {
        let mut img = filled_rect(30, 30, 5, 5, 20, 20);
        img.put_pixel(12, 12, image::Luma([0]));
        let cleaned = denoise(&img, size(3));
        assert_eq!(cleaned.get_pixel(12, 12).0[0], 255);
    }

    #[test]
    fn denoise_size_one_is_identity() {
        let mut img = filled_rect(20, 20, 3, 3, 9, 15);
        img.put_pixel(17, 17, image::Luma([255]));
        let cleaned = denoise(&img, KernelSize::ONE);
        assert_eq!(cleaned, img);
    }

    #[test]
    fn denoise_preserves_dimensions() {
        let img = GrayImage::new(13, 29);
        let cleaned = denoise(&img, size(5));
        assert_eq!(cleaned.dimensions(), (13, 29));
    }

    #[test]
    fn empty_image_passes_through() {
        let img = GrayImage::new(0, 7);
        assert_eq!(denoise(&img, size(3)).dimensions(), (0, 7));
        let square = StructuringElement::square(size(3));
        assert_eq!(dilate(&img, &square).dimensions(), (0, 7));
    }

    #[test]
    fn denoise_is_idempotent_on_clean_mask() {
        let img = filled_rect(40, 40, 8, 10, 30, 28);
        let once = denoise(&img, size(3));
        let twice = denoise(&once, size(3));
        assert_eq!(once, twice);
    }

    #[test]
    fn denoise_raw_rejects_bad_sizes() {
        let img = GrayImage::new(4, 4);
        assert!(matches!(
            denoise_raw(&img, 0),
            Err(MaskError::InvalidParameter(_))
        ));
        assert!(matches!(
            denoise_raw(&img, 4),
            Err(MaskError::InvalidParameter(_))
        ));
        assert!(denoise_raw(&img, 3).is_ok());
    }
}
