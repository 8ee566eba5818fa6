use nalgebra::{Point2, Vector2};
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::algorithms::switched_array::ArrayMeasurement;
use crate::algorithms::triangulation::Triangulator;
use crate::core::{TriangulationMethod, TriangulationResult};
use crate::processing::field::FieldSampler;
use crate::processing::scenario::{measurements_of, Scenario};
use crate::validation::error::Result;

/// Accuracy validation and error statistics for emitter fixes
pub struct AccuracyValidator {
    /// History of position errors for statistical analysis
    pub position_error_history: VecDeque<PositionError>,
    /// Maximum history size
    max_history_size: usize,
}

/// Position error of one fix
#[derive(Debug, Clone)]
pub struct PositionError {
    /// True emitter position
    pub true_position: Point2<f64>,
    /// Estimated emitter position
    pub estimated_position: Point2<f64>,
    /// Error vector
    pub error_vector: Vector2<f64>,
    /// Error magnitude (meters)
    pub error_magnitude: f64,
    /// Bearings used in the final fit
    pub inlier_count: usize,
    pub method: TriangulationMethod,
}

/// Accuracy statistics over multiple fixes
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyStatistics {
    /// Mean position error (meters)
    pub mean_error: f64,
    /// Standard deviation of position error (meters)
    pub std_dev_error: f64,
    /// 95% confidence error (meters)
    pub error_95_percentile: f64,
    /// Root Mean Square Error (RMSE) (meters)
    pub rmse: f64,
    /// Maximum observed error (meters)
    pub max_error: f64,
    /// Minimum observed error (meters)
    pub min_error: f64,
    /// Number of samples in statistics
    pub sample_count: usize,
}

/// Accuracy validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub statistics: AccuracyStatistics,
    /// Sub-meter accuracy achievement rate (0-1)
    pub submeter_accuracy_rate: f64,
    /// Suggestions for improving the fixes
    pub recommendations: Vec<String>,
}

/// Outcome of a Monte-Carlo run
#[derive(Debug, Clone)]
pub struct MonteCarloSummary {
    pub statistics: AccuracyStatistics,
    /// Trials whose fix failed (degenerate geometry, no consensus, ...)
    pub failed_trials: usize,
    pub trials: usize,
}

/// Angular error statistics of switched-array measurements
#[derive(Debug, Clone, PartialEq)]
pub struct AngularStatistics {
    pub mean_error_deg: f64,
    pub rmse_deg: f64,
    pub max_error_deg: f64,
    pub mean_confidence: f64,
    pub sample_count: usize,
}

impl Default for AccuracyValidator {
    fn default() -> Self {
        Self {
            position_error_history: VecDeque::new(),
            max_history_size: 1000,
        }
    }
}

impl AccuracyValidator {
    /// Create a new accuracy validator
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_size(max_history_size: usize) -> Self {
        Self {
            position_error_history: VecDeque::with_capacity(max_history_size),
            max_history_size: max_history_size.max(1),
        }
    }

    /// Error of a fix against the known emitter position
    pub fn calculate_position_error(
        &self,
        true_position: &Point2<f64>,
        result: &TriangulationResult,
    ) -> PositionError {
        let error_vector = result.position - true_position;
        PositionError {
            true_position: *true_position,
            estimated_position: result.position,
            error_vector,
            error_magnitude: error_vector.norm(),
            inlier_count: result.inlier_count(),
            method: result.method,
        }
    }

    /// Add position error to history
    pub fn add_error_to_history(&mut self, error: PositionError) {
        self.position_error_history.push_back(error);

        while self.position_error_history.len() > self.max_history_size {
            self.position_error_history.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.position_error_history.clear();
    }

    /// Calculate accuracy statistics from error history
    pub fn calculate_statistics(&self) -> AccuracyStatistics {
        let errors: Vec<f64> = self
            .position_error_history
            .iter()
            .map(|e| e.error_magnitude)
            .collect();
        error_statistics(&errors)
    }

    /// Summarize the history, including the sub-meter rate
    pub fn validate_accuracy(&self) -> ValidationResult {
        let statistics = self.calculate_statistics();
        let n = self.position_error_history.len();
        let submeter_accuracy_rate = if n == 0 {
            0.0
        } else {
            self.position_error_history
                .iter()
                .filter(|e| e.error_magnitude < 1.0)
                .count() as f64
                / n as f64
        };

        let mut recommendations = Vec::new();
        if n > 0 && statistics.error_95_percentile > 3.0 * statistics.mean_error.max(1e-9) {
            recommendations.push(
                "Heavy error tail: prefer the robust consensus fit or tighten its inlier threshold."
                    .to_string(),
            );
        }
        let mean_inliers = if n == 0 {
            0.0
        } else {
            self.position_error_history
                .iter()
                .map(|e| e.inlier_count as f64)
                .sum::<f64>()
                / n as f64
        };
        if n > 0 && mean_inliers < 4.0 {
            recommendations.push(
                "Few bearings survive per fix: add sensor pairs or spread them around the emitter."
                    .to_string(),
            );
        }

        ValidationResult {
            statistics,
            submeter_accuracy_rate,
            recommendations,
        }
    }

    /// Run `trials` independent scenarios and record every successful fix
    pub fn simulate_accuracy<F, R>(
        &mut self,
        scenario: &Scenario,
        field: &F,
        triangulator: &Triangulator,
        method: TriangulationMethod,
        trials: usize,
        rng: &mut R,
    ) -> Result<MonteCarloSummary>
    where
        F: FieldSampler + ?Sized,
        R: Rng + ?Sized,
    {
        let emitter = scenario.config().emitter()?;
        let truth = Point2::new(emitter.position().x, emitter.position().y);
        let mut failed_trials = 0;
        let mut errors = Vec::with_capacity(trials);

        for trial in 0..trials {
            let observations = scenario.run(&emitter, field, rng)?;
            let measurements = measurements_of(&observations);
            let fix = match method {
                TriangulationMethod::LeastSquares => triangulator.least_squares(&measurements),
                TriangulationMethod::Robust => triangulator.robust_with_rng(&measurements, rng),
            };
            match fix {
                Ok(result) => {
                    let error = self.calculate_position_error(&truth, &result);
                    errors.push(error.error_magnitude);
                    self.add_error_to_history(error);
                }
                Err(e) => {
                    warn!(trial, error = %e, "trial produced no fix");
                    failed_trials += 1;
                }
            }
        }

        let statistics = error_statistics(&errors);
        debug!(
            trials,
            failed_trials,
            mean = statistics.mean_error,
            rmse = statistics.rmse,
            "monte-carlo accuracy"
        );
        Ok(MonteCarloSummary {
            statistics,
            failed_trials,
            trials,
        })
    }
}

/// Mean, spread and percentiles of a set of error magnitudes
pub fn error_statistics(errors: &[f64]) -> AccuracyStatistics {
    if errors.is_empty() {
        return AccuracyStatistics {
            mean_error: 0.0,
            std_dev_error: 0.0,
            error_95_percentile: 0.0,
            rmse: 0.0,
            max_error: 0.0,
            min_error: 0.0,
            sample_count: 0,
        };
    }

    let n = errors.len();
    let mean_error = errors.iter().sum::<f64>() / n as f64;
    let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n as f64).sqrt();
    let variance = errors.iter().map(|e| (e - mean_error).powi(2)).sum::<f64>() / n as f64;

    let max_error = errors.iter().copied().fold(0.0, f64::max);
    let min_error = errors.iter().copied().fold(f64::INFINITY, f64::min);

    let mut sorted = errors.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index_95 = ((n as f64 * 0.95).ceil() as usize).saturating_sub(1);
    let error_95_percentile = sorted[index_95.min(n - 1)];

    AccuracyStatistics {
        mean_error,
        std_dev_error: variance.sqrt(),
        error_95_percentile,
        rmse,
        max_error,
        min_error,
        sample_count: n,
    }
}

/// Angular error statistics of a switched-array sweep
pub fn angular_statistics(measurements: &[ArrayMeasurement]) -> AngularStatistics {
    let n = measurements.len();
    if n == 0 {
        return AngularStatistics {
            mean_error_deg: 0.0,
            rmse_deg: 0.0,
            max_error_deg: 0.0,
            mean_confidence: 0.0,
            sample_count: 0,
        };
    }
    let count = n as f64;
    AngularStatistics {
        mean_error_deg: measurements.iter().map(|m| m.error_deg).sum::<f64>() / count,
        rmse_deg: (measurements.iter().map(|m| m.error_deg.powi(2)).sum::<f64>() / count).sqrt(),
        max_error_deg: measurements.iter().map(|m| m.error_deg).fold(0.0, f64::max),
        mean_confidence: measurements.iter().map(|m| m.estimate.confidence).sum::<f64>() / count,
        sample_count: n,
    }
}
