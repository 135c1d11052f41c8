//! specmask-bench: batch mask generation with per-stage diagnostics.
//!
//! Runs one mask generator over a set of images (files or directories of
//! JPEG/TIFF/PNG scans), prints a diagnostics report per image and
//! optionally writes the masks as PNG files. Useful for:
//!
//! - Tuning Canny thresholds, blur and morphology sizes
//! - Comparing manual thresholds with Otsu's automatic level
//! - Measuring per-stage durations on large scans
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin specmask-bench -- [OPTIONS] <INPUTS>...
//! ```
//!
//! Set `RUST_LOG=specmask_pipeline=debug` to see every stage as it runs.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use specmask_pipeline::diagnostics::{Clock, GenerationDiagnostics};
use specmask_pipeline::{
    CannyConfig, GeneratorConfig, KernelSize, MaskGenerator, ThresholdConfig, is_supported_image,
};

/// Batch mask generation and diagnostics for specimen scans.
#[derive(Parser)]
#[command(name = "specmask-bench", version)]
struct Cli {
    /// Images or directories of images (jpg, jpeg, tif, tiff, png).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Mask generator to run.
    #[arg(long, value_enum, default_value_t = Generator::Canny)]
    generator: Generator,

    /// Canny hysteresis low threshold.
    #[arg(long, default_value_t = CannyConfig::DEFAULT_MIN_THRESHOLD)]
    min_threshold: f32,

    /// Canny hysteresis high threshold.
    #[arg(long, default_value_t = CannyConfig::DEFAULT_MAX_THRESHOLD)]
    max_threshold: f32,

    /// Manual threshold level (used with --manual-threshold).
    #[arg(long, default_value_t = ThresholdConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Foreground intensity written by the threshold stage.
    #[arg(long, default_value_t = ThresholdConfig::DEFAULT_MAX_VALUE)]
    max_value: u8,

    /// Use --threshold instead of Otsu's automatic level.
    #[arg(long)]
    manual_threshold: bool,

    /// Treat dark pixels as foreground.
    #[arg(long)]
    invert: bool,

    /// Gaussian blur kernel size (odd).
    #[arg(long, default_value_t = 3)]
    blur_size: u32,

    /// Denoise structuring element size (odd).
    #[arg(long, default_value_t = 3)]
    morph_size: u32,

    /// Fill holes enclosed by the mask.
    #[arg(long)]
    flood_fill: bool,

    /// Keep only the largest outer contour, filled.
    #[arg(long)]
    contour_reduce: bool,

    /// Full generator config as a JSON string.
    ///
    /// When provided, all other generator parameter flags are ignored.
    /// The JSON must be a valid `GeneratorConfig` serialization, e.g.
    /// `{"threshold": {"auto_threshold": false, "threshold": 90}}`.
    #[arg(long)]
    config_json: Option<String>,

    /// Write `<stem>_mask.png` for every input into this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Number of runs per image for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Generator selection.
#[derive(Clone, Copy, ValueEnum)]
enum Generator {
    /// Canny edges, denoise, 3x3 dilation.
    Canny,
    /// Global threshold (Otsu unless --manual-threshold), denoise.
    Threshold,
}

/// Build a [`GeneratorConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<GeneratorConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let blur_size =
        KernelSize::new(cli.blur_size).map_err(|e| format!("Invalid --blur-size: {e}"))?;
    let morph_size =
        KernelSize::new(cli.morph_size).map_err(|e| format!("Invalid --morph-size: {e}"))?;

    Ok(match cli.generator {
        Generator::Canny => GeneratorConfig::Canny(CannyConfig {
            min_threshold: cli.min_threshold,
            max_threshold: cli.max_threshold,
            blur_size,
            morph_size,
            flood_fill: cli.flood_fill,
            contour_reduce: cli.contour_reduce,
        }),
        Generator::Threshold => GeneratorConfig::Threshold(ThresholdConfig {
            threshold: cli.threshold,
            max_value: cli.max_value,
            blur_size,
            morph_size,
            invert_foreground: cli.invert,
            auto_threshold: !cli.manual_threshold,
            flood_fill: cli.flood_fill,
            contour_reduce: cli.contour_reduce,
        }),
    })
}

/// Expand directories into the supported images they contain, sorted by
/// path. Plain file arguments are kept as given.
fn collect_images(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && is_supported_image(path))
                .collect();
            found.sort();
            images.extend(found);
        } else {
            images.push(input.clone());
        }
    }
    Ok(images)
}

/// Output path of the mask for `image` inside `out_dir`.
fn mask_path(out_dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    out_dir.join(format!("{stem}_mask.png"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let generator = match config.build() {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let images = match collect_images(&cli.inputs) {
        Ok(images) if !images.is_empty() => images,
        Ok(_) => {
            eprintln!("No supported images found");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error listing inputs: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref dir) = cli.out_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Error creating {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    tracing::info!(
        generator = generator.name(),
        images = images.len(),
        runs = cli.runs,
        "starting"
    );
    tracing::debug!("config: {config:?}");

    let mut failures = 0usize;
    for image in &images {
        if let Err(msg) = run_image(&cli, &generator, image) {
            tracing::error!(image = %image.display(), "{msg}");
            failures += 1;
        }
    }

    if failures > 0 {
        eprintln!("{failures} of {} images failed", images.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Generate `cli.runs` masks for one image, print diagnostics and write
/// the first mask if requested.
fn run_image(cli: &Cli, generator: &MaskGenerator, image: &Path) -> Result<(), String> {
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- {} run {}/{} ---", image.display(), run + 1, cli.runs);
        }

        let (mask, diagnostics) = generator
            .generate_with_diagnostics(image, &StdClock)
            .map_err(|e| format!("Generation failed: {e}"))?;

        if cli.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("Image: {}", image.display());
            println!("{}", diagnostics.report());
            println!();
        }

        if run == 0
            && let Some(ref out_dir) = cli.out_dir
        {
            let path = mask_path(out_dir, image);
            mask.save(&path)
                .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
            tracing::info!(mask = %path.display(), "mask written");
        }

        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Per-stage mean durations in milliseconds, keyed by stage name in
/// first-seen order.
#[allow(clippy::cast_precision_loss)]
fn stage_means(all_diagnostics: &[GenerationDiagnostics]) -> Vec<(&'static str, f64)> {
    let mut order = Vec::new();
    let mut totals: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
    for diag in all_diagnostics {
        for stage in &diag.stages {
            let name = stage.metrics.stage_name();
            let entry = totals.entry(name).or_insert_with(|| {
                order.push(name);
                (0.0, 0)
            });
            entry.0 += stage.duration.as_secs_f64() * 1000.0;
            entry.1 += 1;
        }
    }
    order
        .into_iter()
        .filter_map(|name| {
            totals
                .get(name)
                .map(|&(sum, count)| (name, sum / count as f64))
        })
        .collect()
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[GenerationDiagnostics]) {
    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));
    for (name, stage_mean) in stage_means(all_diagnostics) {
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("specmask-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_build_threshold_config() {
        let cli = parse(&[
            "--generator",
            "threshold",
            "--manual-threshold",
            "--threshold",
            "90",
            "--invert",
            "--morph-size",
            "5",
            "scan.png",
        ]);
        let GeneratorConfig::Threshold(config) = config_from_cli(&cli).unwrap() else {
            panic!("expected threshold config");
        };
        assert_eq!(config.threshold, 90);
        assert!(!config.auto_threshold);
        assert!(config.invert_foreground);
        assert_eq!(config.morph_size.get(), 5);
    }

    #[test]
    fn defaults_build_canny_config() {
        let cli = parse(&["scan.png"]);
        assert_eq!(
            config_from_cli(&cli).unwrap(),
            GeneratorConfig::Canny(CannyConfig::default())
        );
    }

    #[test]
    fn even_kernel_flag_is_rejected() {
        let cli = parse(&["--blur-size", "4", "scan.png"]);
        assert!(config_from_cli(&cli).unwrap_err().contains("--blur-size"));
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "--generator",
            "threshold",
            "--config-json",
            r#"{"canny": {"min_threshold": 10, "max_threshold": 20}}"#,
            "scan.png",
        ]);
        let GeneratorConfig::Canny(config) = config_from_cli(&cli).unwrap() else {
            panic!("expected canny config");
        };
        assert!((config.min_threshold - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn directories_expand_to_supported_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.TIF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let images = collect_images(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.TIF", "b.png"]);
    }

    #[test]
    fn mask_path_uses_stem() {
        let path = mask_path(Path::new("/out"), Path::new("/scans/leaf-01.tif"));
        assert_eq!(path, PathBuf::from("/out/leaf-01_mask.png"));
    }
}
