//! Generation diagnostics: timing and pixel counts for each stage.
//!
//! Every generation run records one [`StageDiagnostics`] per executed
//! stage. Plain `generate` calls discard them; the bench CLI and tuning
//! tools ask for them through
//! [`MaskGenerator::generate_with_diagnostics`](crate::MaskGenerator::generate_with_diagnostics).
//!
//! Timestamps come from a caller-supplied [`Clock`] so the engine does not
//! pick a platform timer itself. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration`
//! does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Every duration is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClock;

impl Clock for NoopClock {
    type Instant = ();

    fn now(&self) -> Self::Instant {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDiagnostics {
    /// Which generator produced the mask (`"canny"` or `"threshold"`).
    pub generator: String,
    /// Executed stages in order. Optional stages that were disabled are
    /// absent.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: GenerationSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image loading and grayscale conversion.
    Load {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Gaussian blur.
    Blur {
        /// Kernel side length.
        kernel_size: u32,
        /// Sigma derived from the kernel size.
        sigma: f32,
    },
    /// Canny edge detection.
    EdgeDetection {
        /// Low hysteresis threshold.
        low_threshold: f32,
        /// High hysteresis threshold.
        high_threshold: f32,
        /// Number of edge pixels in the output.
        edge_pixel_count: u64,
    },
    /// Global threshold.
    Threshold {
        /// Level actually applied.
        level: u8,
        /// Whether the level came from Otsu's method.
        auto: bool,
        /// Whether dark pixels were taken as foreground.
        inverted: bool,
        /// Foreground pixels after thresholding.
        foreground_pixels: u64,
    },
    /// Morphological closing then opening.
    Denoise {
        /// Structuring element side length.
        kernel_size: u32,
        /// Foreground pixels after denoising.
        foreground_pixels: u64,
    },
    /// Hole closing by flood fill.
    FloodFill {
        /// Foreground pixels before filling.
        foreground_before: u64,
        /// Foreground pixels after filling.
        foreground_after: u64,
    },
    /// Largest outer contour selection.
    ContourReduce {
        /// Number of top-level outer contours found.
        contour_count: usize,
        /// Area of the selected contour in square pixels.
        selected_area: f64,
        /// Point count of the selected contour.
        selected_points: usize,
        /// Foreground pixels of the rendered contour.
        foreground_pixels: u64,
    },
    /// Final fixed dilation of edge masks.
    Dilate {
        /// Foreground pixels after dilation.
        foreground_pixels: u64,
    },
}

impl StageMetrics {
    /// Display name of the stage these metrics belong to.
    #[must_use]
    pub const fn stage_name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "Load",
            Self::Blur { .. } => "Blur",
            Self::EdgeDetection { .. } => "Edge Detection",
            Self::Threshold { .. } => "Threshold",
            Self::Denoise { .. } => "Denoise",
            Self::FloodFill { .. } => "Flood Fill",
            Self::ContourReduce { .. } => "Contour Reduce",
            Self::Dilate { .. } => "Dilate",
        }
    }
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Foreground pixels in the returned mask.
    pub foreground_pixels: u64,
    /// Threshold level applied, for threshold generators.
    pub threshold_level: Option<u8>,
    /// Outer contours seen by contour reduction, when it ran.
    pub contour_count: Option<usize>,
}

impl GenerationDiagnostics {
    /// Diagnostics for the stage named `name`, if it ran.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.metrics.stage_name() == name)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Mask Generation Report ({})\n{}",
            self.generator,
            "=".repeat(60)
        ));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let name = diag.metrics.stage_name();
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let mut footer = format!("Foreground: {}", self.summary.foreground_pixels);
        if let Some(level) = self.summary.threshold_level {
            footer.push_str(&format!("  |  Threshold: {level}"));
        }
        if let Some(count) = self.summary.contour_count {
            footer.push_str(&format!("  |  Contours: {count}"));
        }
        lines.push(footer);

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
#[must_use]
pub fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Load {
            width,
            height,
            pixel_count,
        } => format!("{width}x{height} ({pixel_count} px)"),
        StageMetrics::Blur { kernel_size, sigma } => {
            format!("{kernel_size}x{kernel_size} sigma={sigma:.2}")
        }
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
        } => format!("low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count}"),
        StageMetrics::Threshold {
            level,
            auto,
            inverted,
            foreground_pixels,
        } => {
            let mode = if *auto { "otsu" } else { "manual" };
            let polarity = if *inverted { " inverted" } else { "" };
            format!("level={level} ({mode}{polarity}) fg={foreground_pixels}")
        }
        StageMetrics::Denoise {
            kernel_size,
            foreground_pixels,
        } => format!("{kernel_size}x{kernel_size} fg={foreground_pixels}"),
        StageMetrics::FloodFill {
            foreground_before,
            foreground_after,
        } => format!("fg={foreground_before}->{foreground_after}"),
        StageMetrics::ContourReduce {
            contour_count,
            selected_area,
            selected_points,
            foreground_pixels,
        } => format!(
            "{contour_count} contours, kept area={selected_area:.1} ({selected_points} pts) fg={foreground_pixels}",
        ),
        StageMetrics::Dilate { foreground_pixels } => format!("3x3 fg={foreground_pixels}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> GenerationDiagnostics {
        GenerationDiagnostics {
            generator: "threshold".to_string(),
            stages: vec![
                StageDiagnostics {
                    duration: Duration::from_millis(10),
                    metrics: StageMetrics::Load {
                        width: 100,
                        height: 80,
                        pixel_count: 8000,
                    },
                },
                StageDiagnostics {
                    duration: Duration::from_millis(5),
                    metrics: StageMetrics::Threshold {
                        level: 97,
                        auto: true,
                        inverted: false,
                        foreground_pixels: 2500,
                    },
                },
                StageDiagnostics {
                    duration: Duration::from_millis(5),
                    metrics: StageMetrics::ContourReduce {
                        contour_count: 4,
                        selected_area: 2100.0,
                        selected_points: 12,
                        foreground_pixels: 2200,
                    },
                },
            ],
            total_duration: Duration::from_millis(20),
            summary: GenerationSummary {
                image_width: 100,
                image_height: 80,
                pixel_count: 8000,
                foreground_pixels: 2200,
                threshold_level: Some(97),
                contour_count: Some(4),
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn noop_clock_reports_zero() {
        let clock = NoopClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Mask Generation Report (threshold)"));
        assert!(report.contains("Load"));
        assert!(report.contains("level=97 (otsu)"));
        assert!(report.contains("Contours: 4"));
        assert!(!report.contains("Dilate"));
    }

    #[test]
    fn stage_lookup_by_name() {
        let diag = sample();
        assert!(diag.stage("Threshold").is_some());
        assert!(diag.stage("Flood Fill").is_none());
    }

    #[test]
    fn json_durations_are_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        let total = json["total_duration"].as_f64().unwrap();
        assert!((total - 0.02).abs() < 1e-9);
        let back: GenerationDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.stages.len(), 3);
        assert_eq!(back.stages[1].metrics, sample().stages[1].metrics);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<GenerationDiagnostics>(json).is_err());
    }
}
