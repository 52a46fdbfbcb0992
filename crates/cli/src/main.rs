//! velgrid CLI - dense velocity grids from sparse velocity picks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use velgrid_algorithms::orchestrator::{Method, RunOutcome};
use velgrid_algorithms::regression::{regression_summary, LINEAR_SEED, LOGARITHMIC_SEED};
use velgrid_algorithms::session::VelocitySession;
use velgrid_algorithms::two_stage::{FillStrategy, TwoStageParams};
use velgrid_core::io::{export_file_name, read_picks, write_binary, write_text, SeismicHeader, SeismicVolume};
use velgrid_core::{InterpolationConfig, NeverCancel, PickSet, SeismicDimensions, VelocityGrid};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "velgrid")]
#[command(author, version, about = "Dense seismic velocity grids from sparse picks", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pick statistics and quick regression parameters
    Info {
        /// Pick file (trace, time, velocity)
        input: PathBuf,
    },
    /// Build a velocity grid from picks
    Interpolate {
        /// Pick file (trace, time, velocity)
        input: PathBuf,
        /// Method: rbf, custom-linear, best-linear, custom-log, best-log, two-stage
        #[arg(short, long, default_value = "two-stage")]
        method: String,
        /// V0 for custom regression methods
        #[arg(long, default_value = "1500")]
        v0: f64,
        /// Gradient k for custom regression methods [default: 0.5 linear, 1000 log]
        #[arg(short, long)]
        k: Option<f64>,
        /// Two-stage cross-trace fill: rbf, nearest-blur
        #[arg(long, default_value = "rbf")]
        fill: String,
        /// Seismic header as JSON (sample/trace counts, interval, delay, coordinates)
        #[arg(long, conflicts_with_all = ["traces", "samples"])]
        header: Option<PathBuf>,
        /// Trace count of the seismic volume
        #[arg(long, requires = "samples")]
        traces: Option<usize>,
        /// Samples per trace of the seismic volume
        #[arg(long, requires = "traces")]
        samples: Option<usize>,
        /// Sample interval in microseconds
        #[arg(long, default_value = "4000")]
        interval_us: f64,
        /// Recording delay in milliseconds
        #[arg(long, default_value = "0")]
        delay: f64,
        /// Index of the first trace
        #[arg(long, default_value = "0")]
        first_trace: f64,
        /// Gaussian blur applied to the result (0 = none)
        #[arg(short, long, default_value = "0")]
        blur: f64,
        /// Write the grid as little-endian f32
        #[arg(long)]
        bin: bool,
        /// Write the grid as a CDP/TWT/VEL table
        #[arg(long)]
        txt: bool,
        /// Directory for exported grids
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Interpolation constants as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;
    Ok(())
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos:>3}% {msg}")?);
    Ok(pb)
}

fn load_picks(path: &Path) -> Result<PickSet> {
    let pb = spinner("Reading picks...")?;
    let picks = read_picks(path).with_context(|| format!("Failed to read picks from {}", path.display()))?;
    pb.finish_and_clear();
    info!("Picks: {} across {} traces", picks.len(), picks.unique_traces().len());
    Ok(picks)
}

fn load_config(path: Option<&Path>) -> Result<InterpolationConfig> {
    match path {
        Some(p) => InterpolationConfig::from_path(p).with_context(|| format!("Failed to read config {}", p.display())),
        None => Ok(InterpolationConfig::default()),
    }
}

fn load_header(path: &Path) -> Result<SeismicHeader> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read header {}", path.display()))?;
    let header: SeismicHeader = serde_json::from_str(&text).context("Invalid seismic header")?;
    if let Some(coords) = &header.coordinates
        && coords.len() != header.trace_count
    {
        anyhow::bail!(
            "Header has {} coordinates for {} traces",
            coords.len(),
            header.trace_count
        );
    }
    Ok(header)
}

fn parse_method(name: &str, v0: f64, k: Option<f64>, fill: &str) -> Result<Method> {
    let method = match name.to_lowercase().as_str() {
        "rbf" => Method::Rbf,
        "custom-linear" | "custom_linear" => Method::CustomLinear {
            v0,
            k: k.unwrap_or(LINEAR_SEED[1]),
        },
        "best-linear" | "best_linear" | "linear" => Method::BestLinear,
        "custom-log" | "custom_log" => Method::CustomLog {
            v0,
            k: k.unwrap_or(LOGARITHMIC_SEED[1]),
        },
        "best-log" | "best_log" | "log" => Method::BestLog,
        "two-stage" | "two_stage" => Method::TwoStage(TwoStageParams {
            fill: parse_fill(fill)?,
            smoothing: None,
        }),
        _ => anyhow::bail!(
            "Unknown method: {}. Use rbf, custom-linear, best-linear, custom-log, best-log, two-stage.",
            name
        ),
    };
    Ok(method)
}

fn parse_fill(s: &str) -> Result<FillStrategy> {
    match s.to_lowercase().as_str() {
        "rbf" => Ok(FillStrategy::Rbf),
        "nearest-blur" | "nearest_blur" | "nearest" => Ok(FillStrategy::NearestBlur),
        _ => anyhow::bail!("Unknown fill: {}. Use rbf or nearest-blur.", s),
    }
}

fn print_grid_summary(grid: &VelocityGrid) {
    let stats = grid.statistics();
    let (samples, traces) = grid.shape();
    println!("Grid: {} samples x {} traces", samples, traces);
    if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
        println!("  Velocity: {:.1} - {:.1} m/s (mean {:.1})", min, max, mean);
    }
    if stats.nan_count > 0 {
        println!("  Unset cells: {}", stats.nan_count);
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn info_command(input: &Path) -> Result<()> {
    let picks = load_picks(input)?;
    let config = InterpolationConfig::default();

    println!("File: {}", input.display());
    let Some(summary) = picks.summary() else {
        println!("No picks");
        return Ok(());
    };
    println!("Picks: {} across {} traces", summary.count, picks.unique_traces().len());
    println!("  Traces: {:.0} - {:.0}", summary.trace_range.0, summary.trace_range.1);
    println!("  TWT: {:.1} - {:.1} ms", summary.time_range.0, summary.time_range.1);
    println!(
        "  Velocity: {:.0} - {:.0} m/s",
        summary.velocity_range.0, summary.velocity_range.1
    );

    let regression = regression_summary(&picks, &config);
    println!("\nRegression:");
    match regression.linear {
        Some(fit) => println!("  Linear: V = {:.1} + {:.4}·TWT (R² = {:.4})", fit.v0, fit.k, fit.r2),
        None => println!("  Linear: not available"),
    }
    match regression.logarithmic {
        Some(fit) => println!("  Logarithmic: V = {:.1} + {:.4}·ln(TWT) (R² = {:.4})", fit.v0, fit.k, fit.r2),
        None => println!("  Logarithmic: not available"),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn interpolate_command(
    input: &Path,
    method: Method,
    header: Option<&Path>,
    dims: Option<SeismicDimensions>,
    blur: f64,
    bin: bool,
    txt: bool,
    out_dir: &Path,
    config: InterpolationConfig,
) -> Result<()> {
    let picks = load_picks(input)?;
    let header = header.map(load_header).transpose()?;
    let dims = header.as_ref().map(|h| h.dimensions()).or(dims);

    let mut session = VelocitySession::new(config);
    if let Some(d) = dims {
        info!("Seismic volume: {} samples x {} traces", d.sample_count, d.trace_count);
        session.set_dimensions(d)?;
    }

    let pb = progress_bar()?;
    let mut sink = |percent: u8, msg: &str| {
        pb.set_position(u64::from(percent));
        pb.set_message(msg.to_string());
    };
    let start = Instant::now();
    let outcome = session.interpolate(&method, &picks, &mut sink, &NeverCancel);
    let elapsed = start.elapsed();
    pb.finish_and_clear();

    match outcome {
        RunOutcome::Success(out) => {
            println!("{}", out.description);
            for w in &out.warnings {
                warn!("{}", w);
            }
        }
        RunOutcome::Cancelled => anyhow::bail!("Interpolation cancelled"),
        RunOutcome::Failure { kind, message } => {
            anyhow::bail!("Interpolation failed ({:?}): {}", kind, message)
        }
    }

    if blur > 0.0 {
        session.apply_smoothing(blur).context("Failed to smooth grid")?;
        info!("Applied Gaussian blur {}", blur);
    }

    let grid = session.output().context("No grid produced")?;
    print_grid_summary(grid);
    println!("  Processing time: {:.2?}", elapsed);

    let stem_source = export_stem(input);
    if bin {
        let path = out_dir.join(export_file_name(&stem_source, "bin"));
        let start = Instant::now();
        write_binary(grid, &path).context("Failed to write binary grid")?;
        done("Binary grid", &path, start.elapsed());
    }
    if txt {
        let path = out_dir.join(export_file_name(&stem_source, "dat"));
        let start = Instant::now();
        let coords = header.as_ref().and_then(|h| h.trace_coordinates());
        write_text(grid, coords, &path).context("Failed to write text grid")?;
        done("Text grid", &path, start.elapsed());
    }
    Ok(())
}

/// Pick file path with the `_picks` suffix dropped, used as the export stem.
fn export_stem(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix("_picks") {
        Some(base) if !base.is_empty() => PathBuf::from(base),
        _ => input.to_path_buf(),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => info_command(&input),

        Commands::Interpolate {
            input,
            method,
            v0,
            k,
            fill,
            header,
            traces,
            samples,
            interval_us,
            delay,
            first_trace,
            blur,
            bin,
            txt,
            out_dir,
            config,
        } => {
            let method = parse_method(&method, v0, k, &fill)?;
            let config = load_config(config.as_deref())?;
            let dims = match (samples, traces) {
                (Some(s), Some(t)) => {
                    Some(SeismicDimensions::from_header(s, t, interval_us, delay).with_first_trace(first_trace))
                }
                _ => None,
            };
            if !bin && !txt {
                info!("No export requested; use --bin or --txt to write the grid");
            }
            interpolate_command(
                &input,
                method,
                header.as_deref(),
                dims,
                blur,
                bin,
                txt,
                &out_dir,
                config,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("rbf", 0.0, None, "rbf").unwrap(), Method::Rbf);
        assert_eq!(
            parse_method("custom-log", 1400.0, Some(900.0), "rbf").unwrap(),
            Method::CustomLog { v0: 1400.0, k: 900.0 }
        );
        match parse_method("two-stage", 0.0, None, "nearest-blur").unwrap() {
            Method::TwoStage(p) => assert_eq!(p.fill, FillStrategy::NearestBlur),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_method("kriging", 0.0, None, "rbf").is_err());
        assert!(parse_method("two-stage", 0.0, None, "spline").is_err());
    }

    #[test]
    fn test_custom_k_defaults_per_model() {
        assert_eq!(
            parse_method("custom-linear", 1500.0, None, "rbf").unwrap(),
            Method::CustomLinear { v0: 1500.0, k: 0.5 }
        );
        assert_eq!(
            parse_method("custom-log", 1500.0, None, "rbf").unwrap(),
            Method::CustomLog { v0: 1500.0, k: 1000.0 }
        );
        let cli = Cli::try_parse_from(["velgrid", "interpolate", "p.txt", "-m", "custom-log"]).unwrap();
        match cli.command {
            Commands::Interpolate { k, .. } => assert_eq!(k, None),
            Commands::Info { .. } => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_export_stem() {
        assert_eq!(export_stem(Path::new("/data/line_01_picks.txt")), PathBuf::from("line_01"));
        assert_eq!(export_stem(Path::new("/data/line_02.txt")), PathBuf::from("/data/line_02.txt"));
        assert_eq!(
            export_file_name(&export_stem(Path::new("line_01_picks.txt")), "bin"),
            PathBuf::from("line_01_interpolated_2D.bin")
        );
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "velgrid", "interpolate", "picks.txt", "--method", "best-log", "--traces", "100", "--samples", "500",
            "--bin",
        ])
        .unwrap();
        match cli.command {
            Commands::Interpolate { traces, samples, bin, txt, .. } => {
                assert_eq!((traces, samples), (Some(100), Some(500)));
                assert!(bin && !txt);
            }
            Commands::Info { .. } => panic!("wrong subcommand"),
        }
        // --traces without --samples is rejected
        assert!(Cli::try_parse_from(["velgrid", "interpolate", "p.txt", "--traces", "10"]).is_err());
    }
}
