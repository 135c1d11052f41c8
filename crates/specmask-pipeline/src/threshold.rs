//! Global intensity thresholding and mask normalization.

use image::GrayImage;

use crate::types::{BACKGROUND, FOREGROUND};

/// Which side of the cutoff becomes foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Samples above the cutoff are foreground.
    #[default]
    Binary,
    /// Samples at or below the cutoff are foreground.
    Inverted,
}

impl Polarity {
    /// Polarity for a specimen that is darker than its background when
    /// `invert_foreground` is set.
    #[must_use]
    pub const fn from_invert(invert_foreground: bool) -> Self {
        if invert_foreground {
            Self::Inverted
        } else {
            Self::Binary
        }
    }
}

/// How the cutoff is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// A fixed, user-supplied level.
    Manual(u8),
    /// The level maximizing between-class variance of the histogram.
    Otsu,
}

impl Cutoff {
    /// Resolve the cutoff to a concrete level for `image`.
    #[must_use]
    pub fn level(self, image: &GrayImage) -> u8 {
        match self {
            Self::Manual(level) => level,
            Self::Otsu => otsu_level(image),
        }
    }
}

/// Otsu threshold level of an 8-bit image.
///
/// Empty images have no histogram and yield 0.
#[must_use]
pub fn otsu_level(image: &GrayImage) -> u8 {
    if image.width() == 0 || image.height() == 0 {
        return 0;
    }
    imageproc::contrast::otsu_level(image)
}

/// Threshold `image` at `level`, writing `max_value` for foreground.
///
/// [`Polarity::Binary`]: `src > level ? max_value : 0`.
/// [`Polarity::Inverted`]: `src > level ? 0 : max_value`.
#[must_use = "returns the thresholded image"]
pub fn threshold(image: &GrayImage, level: u8, max_value: u8, polarity: Polarity) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        let above = p.0[0] > level;
        let foreground = match polarity {
            Polarity::Binary => above,
            Polarity::Inverted => !above,
        };
        p.0[0] = if foreground { max_value } else { BACKGROUND };
    }
    out
}

/// Force a mask to exactly {0, 255}: every non-zero sample becomes 255.
#[must_use = "returns the normalized mask"]
pub fn normalize_mask(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for p in out.pixels_mut() {
        if p.0[0] != BACKGROUND {
            p.0[0] = FOREGROUND;
        }
    }
    out
}

/// Number of non-zero samples.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.as_raw().iter().map(|&v| u64::from(v != BACKGROUND)).sum()
}
