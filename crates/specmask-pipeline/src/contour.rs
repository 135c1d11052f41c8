//! Outer contour extraction and largest-blob selection.
//!
//! Borders are traced with Suzuki-Abe border following
//! (`imageproc::contours::find_contours`), which records the nesting
//! hierarchy. Only top-level borders (no parent) are candidates. The mask
//! is traced inside a one-pixel background frame, so blobs touching the
//! image edge get an ordinary outer border like any other blob.
//! Traced borders are compressed to their corner points: interior points
//! of straight horizontal, vertical and diagonal runs are dropped.
//!
//! Contour reduction replaces a noisy mask with the single most
//! significant blob, drawn filled on a blank canvas.

use geo::{Area, LineString, Polygon};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};

use crate::types::{Dimensions, FOREGROUND, MaskError, Point};

/// A closed boundary curve with its enclosed area.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point>,
    area: f64,
}

impl Contour {
    /// Build a contour from its boundary points, computing the area.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }

    /// Boundary points in tracing order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Absolute enclosed area in square pixels (shoelace formula over
    /// pixel centers).
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Number of boundary points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Absolute shoelace area of a closed ring of points.
fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let ring: LineString<f64> = points
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Drop points that lie in the middle of a straight run.
///
/// A point is kept when the step into it differs from the step out of it
/// (the ring is treated as closed).
#[must_use]
pub fn compress_runs(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let step = |a: Point, b: Point| ((b.x - a.x).signum(), (b.y - a.y).signum());
    let kept: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        // Every step identical only happens for degenerate input; keep the
        // first point so the contour is not lost.
        vec![points[0]]
    } else {
        kept
    }
}

/// All top-level outer contours of a binary image, in tracing order.
///
/// Any non-zero pixel is foreground. Blobs touching the image border are
/// included.
#[must_use]
pub fn outer_contours(binary: &GrayImage) -> Vec<Contour> {
    imageproc::contours::find_contours::<i32>(&framed(binary))
        .into_iter()
        .filter(|c| c.parent.is_none())
        .map(|c| {
            let points: Vec<Point> = c
                .points
                .iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            Contour::new(compress_runs(&points))
        })
        .collect()
}

/// Copy of `binary` surrounded by a one-pixel background border.
///
/// Border following only starts an outer border at a background-to-
/// foreground transition, which a blob on the image edge lacks.
fn framed(binary: &GrayImage) -> GrayImage {
    let (w, h) = binary.dimensions();
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if x == 0 || y == 0 || x > w || y > h {
            Luma([0])
        } else {
            *binary.get_pixel(x - 1, y - 1)
        }
    })
}

/// Pick the contour with the largest area; ties keep the first one.
#[must_use]
pub fn largest(contours: Vec<Contour>) -> Option<Contour> {
    contours.into_iter().fold(None, |best, c| match best {
        Some(b) if b.area() >= c.area() => Some(b),
        _ => Some(c),
    })
}

/// The largest top-level outer contour of a binary image.
///
/// # Errors
///
/// Returns [`MaskError::NoContourFound`] if the image has no foreground
/// pixels at all.
pub fn largest_outer_contour(binary: &GrayImage) -> Result<Contour, MaskError> {
    largest(outer_contours(binary)).ok_or(MaskError::NoContourFound)
}

/// Draw `contour` as a solid filled region (boundary included) on a blank
/// canvas.
#[must_use = "returns the rendered mask"]
#[allow(clippy::cast_precision_loss)]
pub fn fill_contour(dimensions: Dimensions, contour: &Contour) -> GrayImage {
    let mut canvas = GrayImage::new(dimensions.width, dimensions.height);
    let color = Luma([FOREGROUND]);

    let mut poly: Vec<imageproc::point::Point<i32>> = contour
        .points()
        .iter()
        .map(|p| imageproc::point::Point::new(p.x, p.y))
        .collect();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    if poly.len() >= 3 {
        draw_polygon_mut(&mut canvas, &poly, color);
    }

    // Polygon rasterization may leave boundary pixels on the right and
    // bottom edges unset; draw the outline explicitly.
    if poly.len() >= 2 {
        let pairs = poly.iter().zip(poly.iter().cycle().skip(1));
        for (a, b) in pairs.take(poly.len()) {
            draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                color,
            );
        }
    }
    for p in &poly {
        if let (Ok(x), Ok(y)) = (u32::try_from(p.x), u32::try_from(p.y))
            && x < dimensions.width
            && y < dimensions.height
        {
            canvas.put_pixel(x, y, color);
        }
    }
    canvas
}

/// Replace a mask with its largest outer contour drawn filled.
///
/// # Errors
///
/// Returns [`MaskError::NoContourFound`] if the mask is empty.
pub fn reduce_to_largest(mask: &GrayImage) -> Result<GrayImage, MaskError> {
    let contour = largest_outer_contour(mask)?;
    Ok(fill_contour(Dimensions::of(mask), &contour))
}
