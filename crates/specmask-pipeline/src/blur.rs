//! Gaussian blur with a fixed square kernel size.
//!
//! The kernel size is what the user tunes; sigma is derived from it with
//! the usual `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8` rule. Kernels of size 3,
//! 5 and 7 use the exact binomial weights instead of sampled Gaussians so
//! small blurs match the classic fixed-point tables.
//!
//! The convolution runs through `imageproc::filter::separable_filter_equal`
//! on a floating-point copy of the image, so neither pass truncates, and
//! the result is rounded to the nearest 8-bit value once at the end.
//!
//! Borders replicate the edge pixel (imageproc's clamped sampling), not
//! the mirrored `reflect-101` border common in other toolkits. The two
//! only differ within `size / 2` pixels of the image edge.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::separable_filter_equal;

use crate::config::KernelSize;

/// Binomial weights for the small kernel sizes, indexed by `size / 2`.
const SMALL_KERNELS: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[
        0.031_25, 0.109_375, 0.218_75, 0.281_25, 0.218_75, 0.109_375, 0.031_25,
    ],
];

/// Standard deviation derived from a kernel size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for(size: KernelSize) -> f32 {
    let ksize = size.get() as f32;
    0.3f32.mul_add((ksize - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// One-dimensional normalized Gaussian weights for `size`.
///
/// The returned vector has `size` entries summing to 1.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn gaussian_kernel(size: KernelSize) -> Vec<f32> {
    if let Some(table) = SMALL_KERNELS.get(size.radius() as usize) {
        return table.to_vec();
    }

    let sigma = sigma_for(size);
    let scale = -0.5 / (sigma * sigma);
    let radius = size.radius() as i32;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let d = i as f32;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Blur a grayscale image with a square Gaussian kernel of `size`.
///
/// Size 1 returns the image unchanged. Output dimensions always equal
/// input dimensions.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, size: KernelSize) -> GrayImage {
    if size == KernelSize::ONE || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let kernel = gaussian_kernel(size);
    let samples: Image<Luma<f32>> = Image::from_fn(image.width(), image.height(), |x, y| {
        Luma([f32::from(image.get_pixel(x, y).0[0])])
    });
    let blurred = separable_filter_equal(&samples, &kernel);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([round_to_u8(blurred.get_pixel(x, y).0[0])])
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
