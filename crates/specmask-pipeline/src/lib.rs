//! specmask-pipeline: foreground mask generation for scanned specimens.
//!
//! Turns a specimen image into a binary mask (foreground 255, background
//! 0) through one of two generators:
//!
//! - [`CannyGenerator`]: prepare -> Canny edges -> denoise -> optional
//!   hole fill -> optional contour reduction -> 3x3 dilation
//! - [`ThresholdGenerator`]: prepare -> global threshold (manual or Otsu)
//!   -> denoise -> optional hole fill -> optional contour reduction
//!
//! Callers build a [`GeneratorConfig`], turn it into a [`MaskGenerator`]
//! with [`GeneratorConfig::build`], and call
//! [`generate`](MaskGenerator::generate) with an image path. The engine
//! reads images but never writes files; persisting masks is up to the
//! caller.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use specmask_pipeline::{GeneratorConfig, ThresholdConfig};
//!
//! let generator = GeneratorConfig::Threshold(ThresholdConfig::default()).build()?;
//! if let Some(mask) = generator.generate(Some(Path::new("scan.tif")))? {
//!     mask.save("scan-mask.png")?;
//! }
//! # Ok::<(), specmask_pipeline::MaskError>(())
//! ```

pub mod blur;
pub mod config;
pub mod contour;
pub mod diagnostics;
pub mod edge;
pub mod fill;
pub mod generator;
pub mod grayscale;
pub mod morphology;
pub mod prepare;
pub mod threshold;
pub mod types;
pub mod worker;

pub use config::{CannyConfig, GeneratorConfig, KernelSize, ThresholdConfig};
pub use contour::{Contour, fill_contour, largest_outer_contour, outer_contours};
pub use diagnostics::{Clock, GenerationDiagnostics, NoopClock};
pub use fill::close_holes;
pub use generator::{CannyGenerator, MaskGenerator, ThresholdGenerator};
pub use grayscale::{SUPPORTED_EXTENSIONS, is_supported_image};
pub use morphology::{denoise, denoise_raw};
pub use prepare::{prepare_bytes, prepare_image};
pub use types::{BACKGROUND, Dimensions, FOREGROUND, GrayImage, MaskError, Point};
pub use worker::{CancelToken, PendingMask, PreviewScheduler, spawn_generation};
