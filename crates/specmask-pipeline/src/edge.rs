//! Canny edge detection with L2 gradient magnitude.
//!
//! The input is expected to be blurred already (the Image Preparer does
//! that with the user's kernel size), so unlike `imageproc::edges::canny`
//! no extra Gaussian pass is applied here. Gradients come from the 3x3
//! Sobel kernels with replicated borders; magnitude is `hypot(gx, gy)`.
//!
//! Non-maximum suppression keeps a pixel whose magnitude is greater than
//! or equal to both neighbours along the gradient direction. Unlike the
//! strict one-sided comparison of classic Canny, a plateau of equal
//! magnitudes therefore survives as a band: a hard 0/255 step yields two
//! edge pixels, one on each side of the step, and a linear ramp keeps
//! every pixel of its constant-gradient stretch.
//!
//! Hysteresis uses strict comparisons: a pixel is a strong edge when its
//! magnitude is above `high`, a weak candidate when above `low`, and weak
//! candidates survive only when 8-connected to a strong edge.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Detect edges and return a binary map: 255 for edges, 0 elsewhere.
///
/// Images smaller than 3x3 have no interior pixels and produce an empty
/// edge map. Callers validate `low <= high`; when violated, `low` is
/// clamped down to `high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return GrayImage::new(w, h);
    }
    let low = low.min(high);

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let magnitude = gradient_magnitude(&gx, &gy);

    let thinned = non_maximum_suppression(&magnitude, &gx, &gy);
    hysteresis(&thinned, low, high)
}

/// L2 norm of the gradient at every pixel.
fn gradient_magnitude(gx: &Image<Luma<i16>>, gy: &Image<Luma<i16>>) -> Image<Luma<f32>> {
    Image::from_fn(gx.width(), gx.height(), |x, y| {
        let dx = f32::from(gx.get_pixel(x, y)[0]);
        let dy = f32::from(gy.get_pixel(x, y)[0]);
        Luma([dx.hypot(dy)])
    })
}

/// Keep only pixels that are local maxima across the gradient direction.
///
/// The border ring is always suppressed.
fn non_maximum_suppression(
    g: &Image<Luma<f32>>,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Image<Luma<f32>> {
    const RADIANS_TO_DEGREES: f32 = 180.0 / std::f32::consts::PI;
    let mut out = Image::from_pixel(g.width(), g.height(), Luma([0.0]));
    for y in 1..g.height() - 1 {
        for x in 1..g.width() - 1 {
            let pixel = g.get_pixel(x, y)[0];
            if pixel <= 0.0 {
                continue;
            }
            let x_gradient = f32::from(gx.get_pixel(x, y)[0]);
            let y_gradient = f32::from(gy.get_pixel(x, y)[0]);
            let mut angle = y_gradient.atan2(x_gradient) * RADIANS_TO_DEGREES;
            if angle < 0.0 {
                angle += 180.0;
            }

            // Neighbours on either side along the quantized gradient direction.
            let (cmp1, cmp2) = if !(22.5..157.5).contains(&angle) {
                (g.get_pixel(x - 1, y)[0], g.get_pixel(x + 1, y)[0])
            } else if angle < 67.5 {
                (g.get_pixel(x + 1, y + 1)[0], g.get_pixel(x - 1, y - 1)[0])
            } else if angle < 112.5 {
                (g.get_pixel(x, y - 1)[0], g.get_pixel(x, y + 1)[0])
            } else {
                (g.get_pixel(x - 1, y + 1)[0], g.get_pixel(x + 1, y - 1)[0])
            };

            if pixel >= cmp1 && pixel >= cmp2 {
                out.put_pixel(x, y, Luma([pixel]));
            }
        }
    }
    out
}

/// Hysteresis thresholding with an explicit stack.
///
/// Neighbour coordinates are bounds-checked before access so the search
/// can reach the border without `u32` underflow.
fn hysteresis(input: &Image<Luma<f32>>, low: f32, high: f32) -> GrayImage {
    let (w, h) = input.dimensions();
    let mut out = GrayImage::new(w, h);
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if input.get_pixel(x, y)[0] <= high || out.get_pixel(x, y)[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));

            while let Some((nx, ny)) = stack.pop() {
                let neighbors = [
                    (nx.wrapping_sub(1), ny.wrapping_sub(1)),
                    (nx, ny.wrapping_sub(1)),
                    (nx + 1, ny.wrapping_sub(1)),
                    (nx.wrapping_sub(1), ny),
                    (nx + 1, ny),
                    (nx.wrapping_sub(1), ny + 1),
                    (nx, ny + 1),
                    (nx + 1, ny + 1),
                ];
                for (px, py) in neighbors {
                    if px >= w || py >= h {
                        continue;
                    }
                    if input.get_pixel(px, py)[0] > low && out.get_pixel(px, py)[0] == 0 {
                        out.put_pixel(px, py, Luma([255]));
                        stack.push((px, py));
                    }
                }
            }
        }
    }
    out
}
