//! Mask generators and the configuration factory.
//!
//! Both generators share one stage sequence:
//!
//! 1. prepare (load, grayscale, blur)
//! 2. core transform (Canny edges or a global threshold)
//! 3. denoise (close then open)
//! 4. flood fill (optional)
//! 5. contour reduce (optional, replaces the mask)
//! 6. final 3x3 dilation (edge generator only)
//!
//! The returned mask is normalized to exactly {0, 255}.

use std::path::Path;

use image::GrayImage;

use crate::blur::sigma_for;
use crate::config::{CannyConfig, GeneratorConfig, KernelSize, ThresholdConfig};
use crate::contour::{fill_contour, largest, outer_contours};
use crate::diagnostics::{
    Clock, GenerationDiagnostics, GenerationSummary, NoopClock, StageDiagnostics, StageMetrics,
    format_metrics,
};
use crate::edge::canny;
use crate::fill::close_holes;
use crate::grayscale::{decode_and_grayscale, load_grayscale};
use crate::morphology::{StructuringElement, denoise, dilate};
use crate::prepare::prepare_gray;
use crate::threshold::{Cutoff, Polarity, count_foreground, normalize_mask, threshold};
use crate::types::{Dimensions, MaskError};
use crate::worker::CancelToken;

/// Where a generation reads its image from.
#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl Source<'_> {
    fn load(self) -> Result<GrayImage, MaskError> {
        match self {
            Self::Path(path) => load_grayscale(path),
            Self::Bytes(bytes) => decode_and_grayscale(bytes),
        }
    }
}

/// Settings every generator variant shares.
#[derive(Debug, Clone, Copy)]
struct SharedStages {
    blur_size: KernelSize,
    morph_size: KernelSize,
    flood_fill: bool,
    contour_reduce: bool,
    final_dilation: bool,
}

/// The variant-specific part of a generator.
trait CoreTransform {
    const NAME: &'static str;

    fn shared(&self) -> SharedStages;

    /// Turn the prepared raster into a first binary mask.
    fn transform(&self, prepared: &GrayImage) -> (GrayImage, StageMetrics);
}

/// Runs stages in order, timing each and honouring cancellation between
/// them.
struct StageRunner<'a, C: Clock> {
    clock: &'a C,
    cancel: Option<&'a CancelToken>,
    stages: Vec<StageDiagnostics>,
}

impl<'a, C: Clock> StageRunner<'a, C> {
    const fn new(clock: &'a C, cancel: Option<&'a CancelToken>) -> Self {
        Self {
            clock,
            cancel,
            stages: Vec::new(),
        }
    }

    fn run<T>(
        &mut self,
        stage: impl FnOnce() -> Result<(T, StageMetrics), MaskError>,
    ) -> Result<T, MaskError> {
        if let Some(token) = self.cancel {
            token.check()?;
        }
        let start = self.clock.now();
        let (value, metrics) = stage()?;
        let duration = self.clock.elapsed(&start);
        tracing::debug!(
            stage = metrics.stage_name(),
            elapsed_ms = duration.as_secs_f64() * 1000.0,
            "{}",
            format_metrics(&metrics),
        );
        self.stages.push(StageDiagnostics { duration, metrics });
        Ok(value)
    }
}

/// Run the full stage sequence of `generator` on `source`.
fn run_stages<G: CoreTransform, C: Clock>(
    generator: &G,
    source: Source<'_>,
    clock: &C,
    cancel: Option<&CancelToken>,
) -> Result<(GrayImage, GenerationDiagnostics), MaskError> {
    let span = tracing::debug_span!("generate", generator = G::NAME);
    let _enter = span.enter();

    let shared = generator.shared();
    let start = clock.now();
    let mut runner = StageRunner::new(clock, cancel);

    let gray = runner.run(|| {
        let gray = source.load()?;
        let dims = Dimensions::of(&gray);
        let metrics = StageMetrics::Load {
            width: dims.width,
            height: dims.height,
            pixel_count: dims.pixel_count(),
        };
        Ok((gray, metrics))
    })?;
    let dimensions = Dimensions::of(&gray);

    let prepared = runner.run(|| {
        let blurred = prepare_gray(&gray, shared.blur_size);
        let metrics = StageMetrics::Blur {
            kernel_size: shared.blur_size.get(),
            sigma: sigma_for(shared.blur_size),
        };
        Ok((blurred, metrics))
    })?;
    drop(gray);

    let mut mask = runner.run(|| Ok(generator.transform(&prepared)))?;
    drop(prepared);

    mask = runner.run(|| {
        let cleaned = denoise(&mask, shared.morph_size);
        let metrics = StageMetrics::Denoise {
            kernel_size: shared.morph_size.get(),
            foreground_pixels: count_foreground(&cleaned),
        };
        Ok((cleaned, metrics))
    })?;

    if shared.flood_fill {
        mask = runner.run(|| {
            let filled = close_holes(&mask);
            let metrics = StageMetrics::FloodFill {
                foreground_before: count_foreground(&mask),
                foreground_after: count_foreground(&filled),
            };
            Ok((filled, metrics))
        })?;
    }

    if shared.contour_reduce {
        mask = runner.run(|| {
            let contours = outer_contours(&mask);
            let contour_count = contours.len();
            let Some(selected) = largest(contours) else {
                tracing::warn!("contour reduction found no outer contour");
                return Err(MaskError::NoContourFound);
            };
            let filled = fill_contour(dimensions, &selected);
            let metrics = StageMetrics::ContourReduce {
                contour_count,
                selected_area: selected.area(),
                selected_points: selected.len(),
                foreground_pixels: count_foreground(&filled),
            };
            Ok((filled, metrics))
        })?;
    }

    if shared.final_dilation {
        mask = runner.run(|| {
            let dilated = dilate(&mask, &StructuringElement::square(KernelSize::THREE));
            let metrics = StageMetrics::Dilate {
                foreground_pixels: count_foreground(&dilated),
            };
            Ok((dilated, metrics))
        })?;
    }

    let mask = normalize_mask(&mask);
    let summary = summarize(&runner.stages, dimensions, count_foreground(&mask));
    let diagnostics = GenerationDiagnostics {
        generator: G::NAME.to_string(),
        stages: runner.stages,
        total_duration: clock.elapsed(&start),
        summary,
    };
    tracing::debug!(
        foreground = diagnostics.summary.foreground_pixels,
        "mask generated"
    );
    Ok((mask, diagnostics))
}

fn summarize(
    stages: &[StageDiagnostics],
    dimensions: Dimensions,
    foreground_pixels: u64,
) -> GenerationSummary {
    let threshold_level = stages.iter().find_map(|s| match s.metrics {
        StageMetrics::Threshold { level, .. } => Some(level),
        _ => None,
    });
    let contour_count = stages.iter().find_map(|s| match s.metrics {
        StageMetrics::ContourReduce { contour_count, .. } => Some(contour_count),
        _ => None,
    });
    GenerationSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        foreground_pixels,
        threshold_level,
        contour_count,
    }
}

/// Treat an empty path like no path at all.
fn selected_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Edge-based mask generator.
#[derive(Debug, Clone, PartialEq)]
pub struct CannyGenerator {
    config: CannyConfig,
}

impl CannyGenerator {
    /// Validate `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] if the thresholds are out of
    /// domain or `min_threshold > max_threshold`.
    pub fn new(config: CannyConfig) -> Result<Self, MaskError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &CannyConfig {
        &self.config
    }

    /// Generate a mask for the image at `path`.
    ///
    /// Returns `Ok(None)` when `path` is `None` or empty.
    ///
    /// # Errors
    ///
    /// Returns a load error if the image cannot be read or decoded, or
    /// [`MaskError::NoContourFound`] if contour reduction is enabled and the
    /// mask is empty.
    pub fn generate(&self, path: Option<&Path>) -> Result<Option<GrayImage>, MaskError> {
        let Some(path) = selected_path(path) else {
            return Ok(None);
        };
        run_stages(self, Source::Path(path), &NoopClock, None).map(|(mask, _)| Some(mask))
    }

    /// Generate a mask from an in-memory encoded image.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_from_bytes(&self, bytes: &[u8]) -> Result<GrayImage, MaskError> {
        run_stages(self, Source::Bytes(bytes), &NoopClock, None).map(|(mask, _)| mask)
    }

    /// Generate a mask and per-stage diagnostics timed with `clock`.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_with_diagnostics<C: Clock>(
        &self,
        path: &Path,
        clock: &C,
    ) -> Result<(GrayImage, GenerationDiagnostics), MaskError> {
        run_stages(self, Source::Path(path), clock, None)
    }
}

impl CoreTransform for CannyGenerator {
    const NAME: &'static str = "canny";

    fn shared(&self) -> SharedStages {
        SharedStages {
            blur_size: self.config.blur_size,
            morph_size: self.config.morph_size,
            flood_fill: self.config.flood_fill,
            contour_reduce: self.config.contour_reduce,
            final_dilation: true,
        }
    }

    fn transform(&self, prepared: &GrayImage) -> (GrayImage, StageMetrics) {
        let (low, high) = (self.config.min_threshold, self.config.max_threshold);
        let edges = canny(prepared, low, high);
        let metrics = StageMetrics::EdgeDetection {
            low_threshold: low,
            high_threshold: high,
            edge_pixel_count: count_foreground(&edges),
        };
        (edges, metrics)
    }
}

/// Threshold-based mask generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdGenerator {
    config: ThresholdConfig,
}

impl ThresholdGenerator {
    /// Validate `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] if `max_value` is zero.
    pub fn new(config: ThresholdConfig) -> Result<Self, MaskError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Generate a mask for the image at `path`.
    ///
    /// Returns `Ok(None)` when `path` is `None` or empty.
    ///
    /// # Errors
    ///
    /// Returns a load error if the image cannot be read or decoded, or
    /// [`MaskError::NoContourFound`] if contour reduction is enabled and the
    /// mask is empty.
    pub fn generate(&self, path: Option<&Path>) -> Result<Option<GrayImage>, MaskError> {
        let Some(path) = selected_path(path) else {
            return Ok(None);
        };
        run_stages(self, Source::Path(path), &NoopClock, None).map(|(mask, _)| Some(mask))
    }

    /// Generate a mask from an in-memory encoded image.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_from_bytes(&self, bytes: &[u8]) -> Result<GrayImage, MaskError> {
        run_stages(self, Source::Bytes(bytes), &NoopClock, None).map(|(mask, _)| mask)
    }

    /// Generate a mask and per-stage diagnostics timed with `clock`.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_with_diagnostics<C: Clock>(
        &self,
        path: &Path,
        clock: &C,
    ) -> Result<(GrayImage, GenerationDiagnostics), MaskError> {
        run_stages(self, Source::Path(path), clock, None)
    }

    fn cutoff(&self) -> Cutoff {
        if self.config.auto_threshold {
            Cutoff::Otsu
        } else {
            Cutoff::Manual(self.config.threshold)
        }
    }
}

impl CoreTransform for ThresholdGenerator {
    const NAME: &'static str = "threshold";

    fn shared(&self) -> SharedStages {
        SharedStages {
            blur_size: self.config.blur_size,
            morph_size: self.config.morph_size,
            flood_fill: self.config.flood_fill,
            contour_reduce: self.config.contour_reduce,
            final_dilation: false,
        }
    }

    fn transform(&self, prepared: &GrayImage) -> (GrayImage, StageMetrics) {
        let level = self.cutoff().level(prepared);
        let polarity = Polarity::from_invert(self.config.invert_foreground);
        let binary = threshold(prepared, level, self.config.max_value, polarity);
        let metrics = StageMetrics::Threshold {
            level,
            auto: self.config.auto_threshold,
            inverted: polarity == Polarity::Inverted,
            foreground_pixels: count_foreground(&binary),
        };
        (binary, metrics)
    }
}

/// Either generator variant, built from a [`GeneratorConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum MaskGenerator {
    /// Edge-based generator.
    Canny(CannyGenerator),
    /// Threshold-based generator.
    Threshold(ThresholdGenerator),
}

impl MaskGenerator {
    /// Short variant name (`"canny"` or `"threshold"`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Canny(_) => CannyGenerator::NAME,
            Self::Threshold(_) => ThresholdGenerator::NAME,
        }
    }

    /// The configuration this generator was built from.
    #[must_use]
    pub const fn config(&self) -> GeneratorConfig {
        match self {
            Self::Canny(g) => GeneratorConfig::Canny(g.config),
            Self::Threshold(g) => GeneratorConfig::Threshold(g.config),
        }
    }

    /// Generate a mask for the image at `path`.
    ///
    /// Returns `Ok(None)` when `path` is `None` or empty.
    ///
    /// # Errors
    ///
    /// Returns a load error if the image cannot be read or decoded, or
    /// [`MaskError::NoContourFound`] if contour reduction is enabled and the
    /// mask is empty.
    pub fn generate(&self, path: Option<&Path>) -> Result<Option<GrayImage>, MaskError> {
        match self {
            Self::Canny(g) => g.generate(path),
            Self::Threshold(g) => g.generate(path),
        }
    }

    /// Generate a mask from an in-memory encoded image.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_from_bytes(&self, bytes: &[u8]) -> Result<GrayImage, MaskError> {
        match self {
            Self::Canny(g) => g.generate_from_bytes(bytes),
            Self::Threshold(g) => g.generate_from_bytes(bytes),
        }
    }

    /// Generate a mask and per-stage diagnostics timed with `clock`.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_with_diagnostics<C: Clock>(
        &self,
        path: &Path,
        clock: &C,
    ) -> Result<(GrayImage, GenerationDiagnostics), MaskError> {
        match self {
            Self::Canny(g) => g.generate_with_diagnostics(path, clock),
            Self::Threshold(g) => g.generate_with_diagnostics(path, clock),
        }
    }

    /// [`generate`](Self::generate), stopping at the next stage boundary
    /// once `cancel` is triggered.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Cancelled`] if cancellation was observed, plus
    /// the errors of [`generate`](Self::generate).
    pub fn generate_cancellable(
        &self,
        path: Option<&Path>,
        cancel: &CancelToken,
    ) -> Result<Option<GrayImage>, MaskError> {
        let Some(path) = selected_path(path) else {
            return Ok(None);
        };
        let source = Source::Path(path);
        let (mask, _) = match self {
            Self::Canny(g) => run_stages(g, source, &NoopClock, Some(cancel))?,
            Self::Threshold(g) => run_stages(g, source, &NoopClock, Some(cancel))?,
        };
        Ok(Some(mask))
    }
}

impl GeneratorConfig {
    /// Validate and turn this configuration into a generator.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidParameter`] for any out-of-domain value.
    pub fn build(&self) -> Result<MaskGenerator, MaskError> {
        match *self {
            Self::Canny(config) => CannyGenerator::new(config).map(MaskGenerator::Canny),
            Self::Threshold(config) => ThresholdGenerator::new(config).map(MaskGenerator::Threshold),
        }
    }
}

impl From<CannyGenerator> for MaskGenerator {
    fn from(g: CannyGenerator) -> Self {
        Self::Canny(g)
    }
}

impl From<ThresholdGenerator> for MaskGenerator {
    fn from(g: ThresholdGenerator) -> Self {
        Self::Threshold(g)
    }
}
