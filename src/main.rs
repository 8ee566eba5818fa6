//! rdf-locate: run direction-finding scenarios from the command line
//!
//! Results are written to stdout as JSON; diagnostics go through `tracing`
//! (`RUST_LOG=rdf_geolocation=debug` for per-fix detail).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing::{info, warn};

use rdf_geolocation::processing::scenario::measurements_of;
use rdf_geolocation::validation::accuracy::angular_statistics;
use rdf_geolocation::{
    AccuracyValidator, BearingMeasurement, ConfigurationManager, FreeSpaceField,
    TriangulationMethod, TriangulationResult,
};

#[derive(Parser, Debug)]
#[command(name = "rdf-locate", about = "RF emitter bearing estimation and triangulation")]
struct Cli {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// RNG seed for reproducible runs
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate sensor pairs around the configured emitter and locate it
    Locate {
        #[arg(short, long, value_enum, default_value = "robust")]
        method: MethodArg,
    },

    /// Triangulate bearings read from a JSON file of `{origin, angle_rad, weight}` records
    Measurements {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "least-squares")]
        method: MethodArg,
    },

    /// Estimate one direction with the switched circular array
    Array {
        /// True signal direction (degrees)
        #[arg(short, long)]
        angle_deg: f64,
    },

    /// Sweep the switched array through a full circle
    Sweep {
        /// Angular step (degrees)
        #[arg(long, default_value = "5.0")]
        step_deg: f64,
    },

    /// Monte-Carlo accuracy of the configured scenario
    Validate {
        #[arg(short, long, default_value = "100")]
        trials: usize,
        #[arg(short, long, value_enum, default_value = "robust")]
        method: MethodArg,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    LeastSquares,
    Robust,
}

impl From<MethodArg> for TriangulationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::LeastSquares => TriangulationMethod::LeastSquares,
            MethodArg::Robust => TriangulationMethod::Robust,
        }
    }
}

/// Run the chosen method with the CLI's RNG so `--seed` also fixes the consensus draws
fn triangulate(
    manager: &ConfigurationManager,
    measurements: &[BearingMeasurement],
    method: MethodArg,
    rng: &mut StdRng,
) -> Result<TriangulationResult> {
    let triangulator = manager.triangulator();
    let result = match TriangulationMethod::from(method) {
        TriangulationMethod::LeastSquares => triangulator.least_squares(measurements)?,
        TriangulationMethod::Robust => triangulator.robust_with_rng(measurements, rng)?,
    };
    Ok(result)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rdf_geolocation=info,rdf_locate=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigurationManager::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConfigurationManager::new(),
    };
    let validation = ConfigurationManager::validate(manager.config());
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let seed = cli.seed.or(manager.config().scenario.seed);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let output = match cli.command {
        Command::Locate { method } => {
            let scenario = manager.scenario()?;
            let emitter = scenario.config().emitter()?;
            let field = FreeSpaceField::new(vec![emitter.clone()], manager.wavelength()?)?;
            let observations = scenario.run(&emitter, &field, &mut rng)?;
            let measurements = measurements_of(&observations);

            let result = triangulate(&manager, &measurements, method, &mut rng)?;
            let truth = Point2::new(emitter.position().x, emitter.position().y);
            info!(error_m = result.error_to(&truth), "emitter located");
            json!({
                "emitter": emitter,
                "observations": observations,
                "result": result,
                "error_m": result.error_to(&truth),
            })
        }
        Command::Measurements { file, method } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let measurements: Vec<BearingMeasurement> = serde_json::from_str(&content)
                .with_context(|| format!("parsing bearings from {}", file.display()))?;
            info!(bearings = measurements.len(), "bearings loaded");

            let result = triangulate(&manager, &measurements, method, &mut rng)?;
            json!({ "result": result })
        }
        Command::Array { angle_deg } => {
            let array = manager.switched_array()?;
            let measurement = array.process_measurement(
                angle_deg.to_radians(),
                manager.config().switched_array.snr_db,
                &mut rng,
            )?;
            json!({
                "true_deg": angle_deg,
                "estimated_deg": measurement.estimate.angle.to_degrees(),
                "error_deg": measurement.error_deg,
                "confidence": measurement.estimate.confidence,
                "peak_element": measurement.estimate.peak_element,
            })
        }
        Command::Sweep { step_deg } => {
            anyhow::ensure!(step_deg > 0.0, "step must be positive, got {step_deg}");
            let array = manager.switched_array()?;
            let steps = (360.0 / step_deg).floor() as usize;
            let angles: Vec<f64> = (0..steps)
                .map(|i| (-180.0 + i as f64 * step_deg).to_radians())
                .collect();
            let sweep = array.sweep(&angles, manager.config().switched_array.snr_db, &mut rng)?;
            let stats = angular_statistics(&sweep);
            info!(
                mean_error_deg = stats.mean_error_deg,
                max_error_deg = stats.max_error_deg,
                "sweep complete"
            );
            json!({
                "sample_count": stats.sample_count,
                "mean_error_deg": stats.mean_error_deg,
                "rmse_deg": stats.rmse_deg,
                "max_error_deg": stats.max_error_deg,
                "mean_confidence": stats.mean_confidence,
                "measurements": sweep,
            })
        }
        Command::Validate { trials, method } => {
            let scenario = manager.scenario()?;
            let emitter = scenario.config().emitter()?;
            let field = FreeSpaceField::new(vec![emitter], manager.wavelength()?)?;
            let mut validator = AccuracyValidator::with_history_size(trials.max(1));
            let summary = validator.simulate_accuracy(
                &scenario,
                &field,
                &manager.triangulator(),
                method.into(),
                trials,
                &mut rng,
            )?;
            let report = validator.validate_accuracy();
            let stats = &summary.statistics;
            json!({
                "trials": summary.trials,
                "failed_trials": summary.failed_trials,
                "mean_error_m": stats.mean_error,
                "std_dev_error_m": stats.std_dev_error,
                "error_95_percentile_m": stats.error_95_percentile,
                "rmse_m": stats.rmse,
                "max_error_m": stats.max_error,
                "min_error_m": stats.min_error,
                "submeter_rate": report.submeter_accuracy_rate,
                "recommendations": report.recommendations,
            })
        }
        Command::ShowConfig => serde_json::to_value(manager.config())?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
