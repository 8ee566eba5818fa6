//! Emitter triangulation from lines of bearing
//!
//! Every bearing defines a line `sinθ·x - cosθ·y = sinθ·x0 - cosθ·y0` through
//! its origin. Stacking the lines gives an over-determined `n x 2` system whose
//! least-squares solution minimizes the summed squared perpendicular distance
//! from the estimate to each line.

use nalgebra::{DMatrix, DVector, Matrix2, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::algorithms::consensus::{consensus_inliers, ConsensusConfig};
use crate::core::{
    BearingMeasurement, PositionUncertainty, TriangulationMethod, TriangulationResult, CEP_FACTOR,
    CHI2_2DOF_95,
};
use crate::validation::error::{LocalizationError, Result};

/// Least-squares solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulationConfig {
    /// Scale each line by its measurement weight
    pub use_weights: bool,
    /// Largest design-matrix condition number accepted before reporting degenerate geometry
    pub max_condition_number: f64,
    /// Attach a residual-based covariance to results with more than two bearings
    pub estimate_uncertainty: bool,
}

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            use_weights: true,
            max_condition_number: 1e8,
            estimate_uncertainty: true,
        }
    }
}

/// Bearing-only emitter locator
///
/// Holds only immutable configuration, so a single instance can be shared
/// between threads.
#[derive(Debug, Clone, Default)]
pub struct Triangulator {
    config: TriangulationConfig,
    consensus: ConsensusConfig,
}

/// Solution of the stacked line system
#[derive(Debug, Clone)]
pub(crate) struct LineFit {
    pub position: Point2<f64>,
    pub condition_number: f64,
    /// Unsigned perpendicular distance to each line (m)
    pub distances: Vec<f64>,
    /// Signed, weight-scaled row residuals
    pub weighted_residuals: Vec<f64>,
    /// `AᵀA` of the (weighted) design matrix
    pub normal_matrix: Matrix2<f64>,
}

impl Triangulator {
    pub fn new(config: TriangulationConfig, consensus: ConsensusConfig) -> Self {
        Self { config, consensus }
    }

    pub fn config(&self) -> &TriangulationConfig {
        &self.config
    }

    pub fn consensus_config(&self) -> &ConsensusConfig {
        &self.consensus
    }

    /// Dispatch to the requested solver
    pub fn locate(
        &self,
        measurements: &[BearingMeasurement],
        method: TriangulationMethod,
    ) -> Result<TriangulationResult> {
        match method {
            TriangulationMethod::LeastSquares => self.least_squares(measurements),
            TriangulationMethod::Robust => self.robust(measurements),
        }
    }

    /// Weighted least-squares intersection of all bearings
    pub fn least_squares(
        &self,
        measurements: &[BearingMeasurement],
    ) -> Result<TriangulationResult> {
        if measurements.len() < 2 {
            return Err(LocalizationError::InsufficientMeasurements {
                available: measurements.len(),
                required: 2,
            });
        }

        let refs: Vec<&BearingMeasurement> = measurements.iter().collect();
        let fit = fit_lines(&refs, &self.config)?;
        debug!(
            x = fit.position.x,
            y = fit.position.y,
            condition_number = fit.condition_number,
            bearings = measurements.len(),
            "least-squares fix"
        );

        Ok(self.build_result(
            fit,
            TriangulationMethod::LeastSquares,
            vec![true; measurements.len()],
            0,
        ))
    }

    /// Consensus fit that discards outlying bearings, then refits on the inliers.
    ///
    /// Uses the configured seed when present, otherwise a fresh entropy seed.
    pub fn robust(&self, measurements: &[BearingMeasurement]) -> Result<TriangulationResult> {
        let mut rng = match self.consensus.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.robust_with_rng(measurements, &mut rng)
    }

    pub fn robust_with_rng<R: Rng + ?Sized>(
        &self,
        measurements: &[BearingMeasurement],
        rng: &mut R,
    ) -> Result<TriangulationResult> {
        let consensus = consensus_inliers(measurements, &self.consensus, rng)?;

        let inlier_refs: Vec<&BearingMeasurement> = measurements
            .iter()
            .zip(&consensus.inliers)
            .filter_map(|(m, &keep)| keep.then_some(m))
            .collect();
        let fit = fit_lines(&inlier_refs, &self.config)?;

        let rejected = measurements.len() - inlier_refs.len();
        if rejected > 0 {
            debug!(rejected, "consensus rejected outlying bearings");
        }
        debug!(
            x = fit.position.x,
            y = fit.position.y,
            inliers = inlier_refs.len(),
            iterations = consensus.iterations,
            "robust fix"
        );

        Ok(self.build_result(
            fit,
            TriangulationMethod::Robust,
            consensus.inliers,
            consensus.iterations,
        ))
    }

    fn build_result(
        &self,
        fit: LineFit,
        method: TriangulationMethod,
        inliers: Vec<bool>,
        iterations: usize,
    ) -> TriangulationResult {
        let n = fit.distances.len();
        let rms_residual_m = (fit.distances.iter().map(|d| d * d).sum::<f64>() / n as f64).sqrt();
        let uncertainty = if self.config.estimate_uncertainty {
            position_uncertainty(&fit)
        } else {
            None
        };

        TriangulationResult {
            position: fit.position,
            method,
            rms_residual_m,
            condition_number: fit.condition_number,
            inliers,
            iterations,
            uncertainty,
        }
    }
}

/// Solve the stacked line system for the given bearings via SVD
pub(crate) fn fit_lines(
    measurements: &[&BearingMeasurement],
    config: &TriangulationConfig,
) -> Result<LineFit> {
    let n = measurements.len();
    if n < 2 {
        return Err(LocalizationError::InsufficientMeasurements {
            available: n,
            required: 2,
        });
    }

    let mut a = DMatrix::<f64>::zeros(n, 2);
    let mut b = DVector::<f64>::zeros(n);
    for (i, m) in measurements.iter().enumerate() {
        let w = if config.use_weights { m.effective_weight() } else { 1.0 };
        let (sin_t, cos_t) = (m.direction().y, m.direction().x);
        a[(i, 0)] = w * sin_t;
        a[(i, 1)] = -w * cos_t;
        b[i] = w * (sin_t * m.origin().x - cos_t * m.origin().y);
    }

    let svd = a.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    let condition_number = if s_min > 0.0 { s_max / s_min } else { f64::INFINITY };

    if !(condition_number <= config.max_condition_number) {
        warn!(condition_number, bearings = n, "bearing geometry is degenerate");
        return Err(LocalizationError::DegenerateGeometry {
            condition_number,
            measurement_count: n,
        });
    }

    let solution = svd
        .solve(&b, 1e-12)
        .map_err(|_| LocalizationError::DegenerateGeometry {
            condition_number,
            measurement_count: n,
        })?;
    let position = Point2::new(solution[0], solution[1]);

    let weighted_residuals = (&a * &solution - &b).iter().copied().collect();
    let distances = measurements
        .iter()
        .map(|m| m.perpendicular_distance(&position))
        .collect();

    let ata = a.transpose() * &a;
    let normal_matrix = Matrix2::new(ata[(0, 0)], ata[(0, 1)], ata[(1, 0)], ata[(1, 1)]);

    Ok(LineFit {
        position,
        condition_number,
        distances,
        weighted_residuals,
        normal_matrix,
    })
}

/// Residual-scaled covariance `s²(AᵀA)⁻¹` with its 95% ellipse and CEP.
///
/// Needs at least one redundant bearing (`n > 2`).
pub(crate) fn position_uncertainty(fit: &LineFit) -> Option<PositionUncertainty> {
    let n = fit.weighted_residuals.len();
    if n <= 2 {
        return None;
    }
    let s2 = fit.weighted_residuals.iter().map(|r| r * r).sum::<f64>() / (n - 2) as f64;
    let covariance = fit.normal_matrix.try_inverse()? * s2;

    let cxx = covariance[(0, 0)];
    let cyy = covariance[(1, 1)];
    let cxy = covariance[(0, 1)];
    let trace = cxx + cyy;
    let disc = ((cxx - cyy).powi(2) + 4.0 * cxy * cxy).sqrt();
    let lambda1 = (trace + disc) / 2.0;
    let lambda2 = ((trace - disc) / 2.0).max(0.0);

    Some(PositionUncertainty {
        covariance,
        semi_major_m: (CHI2_2DOF_95 * lambda1).sqrt(),
        semi_minor_m: (CHI2_2DOF_95 * lambda2).sqrt(),
        orientation_rad: (2.0 * cxy).atan2(cxx - cyy) / 2.0,
        cep_m: CEP_FACTOR * (cxx.max(0.0).sqrt() + cyy.max(0.0).sqrt()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wrap_to_pi;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    fn bearing_to(origin: Point2<f64>, target: Point2<f64>) -> BearingMeasurement {
        BearingMeasurement::new(origin, target - origin).unwrap()
    }

    fn ring_of_bearings(target: Point2<f64>, count: usize, radius: f64) -> Vec<BearingMeasurement> {
        (0..count)
            .map(|i| {
                let a = 2.0 * PI * i as f64 / count as f64 + 0.1;
                let origin = Point2::new(target.x + radius * a.cos(), target.y + radius * a.sin());
                bearing_to(origin, target)
            })
            .collect()
    }

    fn seeded() -> Triangulator {
        Triangulator::new(
            TriangulationConfig::default(),
            ConsensusConfig {
                seed: Some(7),
                ..ConsensusConfig::default()
            },
        )
    }

    #[test]
    fn test_least_squares_recovers_emitter() {
        let target = Point2::new(120.0, -40.0);
        let measurements = ring_of_bearings(target, 5, 200.0);
        let result = Triangulator::default().least_squares(&measurements).unwrap();

        assert_abs_diff_eq!(result.position.x, target.x, epsilon = 1e-6);
        assert_abs_diff_eq!(result.position.y, target.y, epsilon = 1e-6);
        assert!(result.rms_residual_m < 1e-6);
        assert_eq!(result.method, TriangulationMethod::LeastSquares);
        assert_eq!(result.inlier_count(), 5);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_two_crossing_bearings() {
        let measurements = vec![
            BearingMeasurement::from_angle(Point2::new(0.0, 0.0), PI / 4.0).unwrap(),
            BearingMeasurement::from_angle(Point2::new(10.0, 0.0), 3.0 * PI / 4.0).unwrap(),
        ];
        let result = Triangulator::default().least_squares(&measurements).unwrap();
        assert_abs_diff_eq!(result.position.x, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.position.y, 5.0, epsilon = 1e-9);
        // Two lines carry no redundancy
        assert!(result.uncertainty.is_none());
    }

    #[test]
    fn test_parallel_bearings_are_degenerate() {
        let measurements = vec![
            BearingMeasurement::from_angle(Point2::new(0.0, 0.0), 0.3).unwrap(),
            BearingMeasurement::from_angle(Point2::new(0.0, 10.0), 0.3).unwrap(),
        ];
        let err = Triangulator::default().least_squares(&measurements).unwrap_err();
        assert!(matches!(err, LocalizationError::DegenerateGeometry { measurement_count: 2, .. }));
    }

    #[test]
    fn test_too_few_measurements() {
        let one = vec![BearingMeasurement::from_angle(Point2::origin(), 0.0).unwrap()];
        assert!(matches!(
            Triangulator::default().least_squares(&one),
            Err(LocalizationError::InsufficientMeasurements { available: 1, required: 2 })
        ));
        assert!(matches!(
            Triangulator::default().least_squares(&[]),
            Err(LocalizationError::InsufficientMeasurements { available: 0, .. })
        ));
    }

    #[test]
    fn test_zero_weights_are_degenerate() {
        let target = Point2::new(10.0, 10.0);
        let measurements: Vec<_> = ring_of_bearings(target, 3, 50.0)
            .into_iter()
            .map(|m| m.with_weight(0.0).unwrap())
            .collect();
        assert!(matches!(
            Triangulator::default().least_squares(&measurements),
            Err(LocalizationError::DegenerateGeometry { .. })
        ));

        // Same bearings solve fine when weights are ignored
        let unweighted = Triangulator::new(
            TriangulationConfig {
                use_weights: false,
                ..TriangulationConfig::default()
            },
            ConsensusConfig::default(),
        );
        let result = unweighted.least_squares(&measurements).unwrap();
        assert_abs_diff_eq!(result.position.x, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_low_weight_reduces_outlier_pull() {
        let target = Point2::new(0.0, 0.0);
        let mut measurements = ring_of_bearings(target, 4, 100.0);
        let bad_origin = Point2::new(100.0, 30.0);
        let bad = BearingMeasurement::from_angle(bad_origin, PI + 0.4).unwrap();

        measurements.push(bad.clone());
        let full = Triangulator::default().least_squares(&measurements).unwrap();

        measurements.pop();
        measurements.push(bad.with_weight(0.05).unwrap());
        let damped = Triangulator::default().least_squares(&measurements).unwrap();

        assert!(damped.error_to(&target) < full.error_to(&target));
    }

    #[test]
    fn test_robust_rejects_corrupted_bearing() {
        let target = Point2::new(100.0, 50.0);
        let mut measurements = ring_of_bearings(target, 6, 150.0);
        let corrupted = &measurements[2];
        let skewed = wrap_to_pi(corrupted.angle() + 40f64.to_radians());
        measurements[2] = BearingMeasurement::from_angle(*corrupted.origin(), skewed).unwrap();

        let triangulator = seeded();
        let ls = triangulator.least_squares(&measurements).unwrap();
        assert!(ls.error_to(&target) > 1.0);

        let robust = triangulator.robust(&measurements).unwrap();
        assert!(robust.error_to(&target) < 1e-6);
        assert_eq!(robust.method, TriangulationMethod::Robust);
        assert_eq!(robust.inlier_count(), 5);
        assert!(!robust.inliers[2]);
        assert!(robust.iterations >= 1);
    }

    #[test]
    fn test_robust_is_reproducible_with_seed() {
        let target = Point2::new(-30.0, 80.0);
        // Odd count so no two bearings are collinear
        let measurements = ring_of_bearings(target, 7, 120.0);
        let a = seeded().robust(&measurements).unwrap();
        let b = seeded().robust(&measurements).unwrap();
        assert_eq!(a, b);
        // All bearings agree, so the search stops on the first good sample
        assert_eq!(a.iterations, 1);
    }

    #[test]
    fn test_locate_dispatch() {
        let target = Point2::new(5.0, 5.0);
        let measurements = ring_of_bearings(target, 4, 30.0);
        let t = seeded();
        let ls = t.locate(&measurements, TriangulationMethod::LeastSquares).unwrap();
        let robust = t.locate(&measurements, TriangulationMethod::Robust).unwrap();
        assert_eq!(ls.method, TriangulationMethod::LeastSquares);
        assert_eq!(robust.method, TriangulationMethod::Robust);
        assert_abs_diff_eq!(ls.position.x, robust.position.x, epsilon = 1e-6);
    }

    #[test]
    fn test_uncertainty_grows_with_noise() {
        let target = Point2::new(0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 2f64.to_radians()).unwrap();

        let noisy: Vec<_> = ring_of_bearings(target, 12, 500.0)
            .into_iter()
            .map(|m| {
                let angle = m.angle() + noise.sample(&mut rng);
                BearingMeasurement::from_angle(*m.origin(), angle).unwrap()
            })
            .collect();
        let result = Triangulator::default().least_squares(&noisy).unwrap();
        let u = result.uncertainty.clone().unwrap();
        assert!(u.semi_major_m >= u.semi_minor_m);
        assert!(u.semi_minor_m > 0.0);
        assert!(u.cep_m > 0.0);
        assert!(result.error_to(&target) < u.semi_major_m * 3.0);

        let clean = Triangulator::default()
            .least_squares(&ring_of_bearings(target, 12, 500.0))
            .unwrap();
        let clean_u = clean.uncertainty.unwrap();
        assert!(clean_u.cep_m < u.cep_m);
    }

    #[test]
    fn test_results_are_identical_across_threads() {
        let target = Point2::new(42.0, 17.0);
        let measurements = ring_of_bearings(target, 6, 90.0);
        let triangulator = std::sync::Arc::new(Triangulator::default());
        let expected = triangulator.least_squares(&measurements).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = triangulator.clone();
                let m = measurements.clone();
                std::thread::spawn(move || t.least_squares(&m).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }
}
