//! Generator configuration: kernel sizes, thresholds, post-process flags.
//!
//! Configurations are plain immutable values. A parameter change in the
//! calling application produces a new configuration, which is turned into
//! a new generator with [`GeneratorConfig::build`](crate::GeneratorConfig::build)
//! or the per-variant constructors. Validation happens at that point so a
//! generator can never hold an out-of-domain value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::MaskError;

/// Side length of a square blur kernel or structuring element.
///
/// Always positive, odd and at most [`KernelSize::MAX`]. Even sizes have
/// no center pixel and are rejected rather than rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct KernelSize(u32);

impl KernelSize {
    /// The 1x1 kernel (identity for blur and morphology).
    pub const ONE: Self = Self(1);

    /// The 3x3 kernel.
    pub const THREE: Self = Self(3);

    /// The largest accepted kernel, 511x511.
    pub const MAX: Self = Self(511);

    /// Create a kernel size.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] if `size` is zero, even or
    /// larger than [`KernelSize::MAX`].
    pub fn new(size: u32) -> Result<Self, MaskError> {
        if size == 0 {
            return Err(MaskError::InvalidParameter(
                "kernel size must be positive".to_string(),
            ));
        }
        if size % 2 == 0 {
            return Err(MaskError::InvalidParameter(format!(
                "kernel size must be odd, got {size}"
            )));
        }
        if size > Self::MAX.0 {
            return Err(MaskError::InvalidParameter(format!(
                "kernel size must be at most {}, got {size}",
                Self::MAX.0
            )));
        }
        Ok(Self(size))
    }

    /// The side length in pixels.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Distance from the center pixel to the kernel edge.
    #[must_use]
    pub const fn radius(self) -> u32 {
        self.0 / 2
    }
}

impl TryFrom<u32> for KernelSize {
    type Error = MaskError;

    fn try_from(size: u32) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<KernelSize> for u32 {
    fn from(size: KernelSize) -> Self {
        size.0
    }
}

impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

/// Parameters of the edge-based (Canny) generator.
///
/// Defaults match the initial values of the interactive tuning panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannyConfig {
    /// Hysteresis low threshold on the L2 gradient magnitude.
    ///
    /// Must be finite, non-negative and at most `max_threshold`.
    pub min_threshold: f32,

    /// Hysteresis high threshold on the L2 gradient magnitude.
    pub max_threshold: f32,

    /// Gaussian blur kernel applied before edge detection.
    pub blur_size: KernelSize,

    /// Elliptical structuring element used for noise removal.
    pub morph_size: KernelSize,

    /// Fill background holes enclosed by the edge mask.
    pub flood_fill: bool,

    /// Replace the mask with the largest filled outer contour.
    pub contour_reduce: bool,
}

impl CannyConfig {
    /// Default hysteresis low threshold.
    pub const DEFAULT_MIN_THRESHOLD: f32 = 50.0;

    /// Default hysteresis high threshold.
    pub const DEFAULT_MAX_THRESHOLD: f32 = 150.0;

    /// Check every field against its domain.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] if a threshold is negative
    /// or not finite, or if `min_threshold > max_threshold`.
    pub fn validate(&self) -> Result<(), MaskError> {
        for (name, value) in [
            ("min_threshold", self.min_threshold),
            ("max_threshold", self.max_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MaskError::InvalidParameter(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.min_threshold > self.max_threshold {
            return Err(MaskError::InvalidParameter(format!(
                "min_threshold ({}) must not exceed max_threshold ({})",
                self.min_threshold, self.max_threshold
            )));
        }
        Ok(())
    }
}

impl Default for CannyConfig {
    fn default() -> Self {
        Self {
            min_threshold: Self::DEFAULT_MIN_THRESHOLD,
            max_threshold: Self::DEFAULT_MAX_THRESHOLD,
            blur_size: KernelSize::THREE,
            morph_size: KernelSize::THREE,
            flood_fill: false,
            contour_reduce: false,
        }
    }
}

/// Parameters of the threshold-based generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ThresholdConfig {
    /// Manual cutoff. Samples strictly above it are foreground (or
    /// background when `invert_foreground` is set).
    ///
    /// Kept but unused when `auto_threshold` is set.
    pub threshold: u8,

    /// Intensity written for foreground samples by the threshold stage.
    ///
    /// Must be non-zero.
    pub max_value: u8,

    /// Gaussian blur kernel applied before thresholding.
    pub blur_size: KernelSize,

    /// Elliptical structuring element used for noise removal.
    pub morph_size: KernelSize,

    /// Treat dark samples as foreground (specimen on a light background).
    pub invert_foreground: bool,

    /// Pick the cutoff automatically (Otsu) instead of using `threshold`.
    pub auto_threshold: bool,

    /// Fill background holes enclosed by the mask.
    pub flood_fill: bool,

    /// Replace the mask with the largest filled outer contour.
    pub contour_reduce: bool,
}

impl ThresholdConfig {
    /// Default manual cutoff.
    pub const DEFAULT_THRESHOLD: u8 = 50;

    /// Default foreground intensity of the threshold stage.
    pub const DEFAULT_MAX_VALUE: u8 = 255;

    /// Check every field against its domain.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] if `max_value` is zero.
    pub fn validate(&self) -> Result<(), MaskError> {
        if self.max_value == 0 {
            return Err(MaskError::InvalidParameter(
                "max_value must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            max_value: Self::DEFAULT_MAX_VALUE,
            blur_size: KernelSize::THREE,
            morph_size: KernelSize::THREE,
            invert_foreground: false,
            auto_threshold: true,
            flood_fill: false,
            contour_reduce: false,
        }
    }
}

/// Configuration of either generator variant.
///
/// Serialized externally tagged, e.g. `{"canny": {"min_threshold": 40}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// Edge-based generator.
    Canny(CannyConfig),
    /// Threshold-based generator.
    Threshold(ThresholdConfig),
}

impl GeneratorConfig {
    /// Check the wrapped configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] for any out-of-domain value.
    pub fn validate(&self) -> Result<(), MaskError> {
        match self {
            Self::Canny(c) => c.validate(),
            Self::Threshold(c) => c.validate(),
        }
    }

    /// Short variant name, used in logs and diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Canny(_) => "canny",
            Self::Threshold(_) => "threshold",
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::Canny(CannyConfig::default())
    }
}
