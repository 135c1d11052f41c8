//! Hole closing by flood fill from the image corner.
//!
//! The background region 4-connected to the top-left pixel is the
//! exterior. It is flooded with foreground on a copy, the copy is
//! inverted so only enclosed background remains set, and that is ORed
//! back into the mask.

use image::{GrayImage, Luma};
use imageproc::drawing::flood_fill;

use crate::types::{BACKGROUND, FOREGROUND};

/// Fill background holes enclosed by the mask.
///
/// When the top-left pixel is already foreground the exterior cannot be
/// identified; the mask is returned unchanged.
#[must_use = "returns the mask with holes filled"]
pub fn close_holes(binary: &GrayImage) -> GrayImage {
    let (w, h) = binary.dimensions();
    if w == 0 || h == 0 {
        return binary.clone();
    }
    if binary.get_pixel(0, 0).0[0] != BACKGROUND {
        tracing::debug!("corner pixel is foreground, skipping hole fill");
        return binary.clone();
    }

    let exterior = flood_fill(binary, 0, 0, Luma([FOREGROUND]));
    let mut filled = binary.clone();
    for (out, flooded) in filled.pixels_mut().zip(exterior.pixels()) {
        // Still background after the flood means enclosed.
        if flooded.0[0] == BACKGROUND {
            out.0[0] = FOREGROUND;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 30x30 mask: filled square [5, 25) with a square hole [12, 18).
    fn square_with_hole() -> GrayImage {
        GrayImage::from_fn(30, 30, |x, y| {
            let in_square = (5..25).contains(&x) && (5..25).contains(&y);
            let in_hole = (12..18).contains(&x) && (12..18).contains(&y);
            image::Luma([if in_square && !in_hole { 255 } else { 0 }])
        })
    }

    #[test]
    fn hole_is_filled_and_exterior_kept() {
        let filled = close_holes(&square_with_hole());
        for (x, y, p) in filled.enumerate_pixels() {
            let in_square = (5..25).contains(&x) && (5..25).contains(&y);
            let expected = if in_square { 255 } else { 0 };
            assert_eq!(p.0[0], expected, "unexpected value at ({x}, {y})");
        }
    }

    #[test]
    fn mask_without_holes_is_unchanged() {
        let img = GrayImage::from_fn(20, 20, |x, y| {
            image::Luma([if (4..10).contains(&x) && (4..10).contains(&y) { 255 } else { 0 }])
        });
        assert_eq!(close_holes(&img), img);
    }

    #[test]
    fn hole_with_gap_to_exterior_stays_open() {
        // Cut a channel from the hole through the right wall.
        let mut img = square_with_hole();
        for x in 15..25 {
            img.put_pixel(x, 15, image::Luma([0]));
        }
        let filled = close_holes(&img);
        assert_eq!(filled.get_pixel(14, 14).0[0], 0);
    }

    #[test]
    fn diagonal_gap_does_not_leak() {
        // 4-connected fill cannot pass between diagonal neighbours.
        let mut img = GrayImage::new(5, 5);
        for &(x, y) in &[(1, 2), (2, 1), (3, 2), (2, 3)] {
            img.put_pixel(x, y, image::Luma([255]));
        }
        let filled = close_holes(&img);
        assert_eq!(filled.get_pixel(2, 2).0[0], 255);
        assert_eq!(filled.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn foreground_corner_is_noop() {
        let mut img = square_with_hole();
        img.put_pixel(0, 0, image::Luma([255]));
        assert_eq!(close_holes(&img), img);
    }

    #[test]
    fn all_background_is_unchanged() {
        let img = GrayImage::new(8, 8);
        assert_eq!(close_holes(&img), img);
    }

    #[test]
    fn foreground_values_are_kept() {
        // Non-255 foreground survives; only the enclosed hole is set.
        let img = GrayImage::from_fn(12, 12, |x, y| {
            let ring = (2..10).contains(&x) && (2..10).contains(&y);
            let hole = (4..8).contains(&x) && (4..8).contains(&y);
            image::Luma([if ring && !hole { 90 } else { 0 }])
        });
        let filled = close_holes(&img);
        assert_eq!(filled.get_pixel(3, 3).0[0], 90);
        assert_eq!(filled.get_pixel(5, 5).0[0], 255);
        assert_eq!(filled.get_pixel(0, 11).0[0], 0);
    }

    #[test]
    fn empty_image_is_unchanged() {
        let img = GrayImage::new(0, 0);
        assert_eq!(close_holes(&img).dimensions(), (0, 0));
    }
}
