//! Consensus (RANSAC-style) selection of mutually consistent bearings
//!
//! Each bearing is a line `a·x + b·y + c = 0` with `a = -dy`, `b = dx` and
//! `c = -(a·x0 + b·y0)`; the emitter `(x, y)` solves `[a b]·p = -c` with no
//! intercept term. Minimal subsets of two lines are intersected, every line is
//! scored by its perpendicular distance to the candidate, and the candidate
//! with the largest inlier set wins.

use nalgebra::{Matrix2, Point2, Vector2};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::BearingMeasurement;
use crate::validation::error::{LocalizationError, Result};

/// Consensus fit parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Largest perpendicular distance (m) at which a bearing still agrees with a candidate
    pub inlier_threshold_m: f64,
    /// Hard cap on sampled subsets, including degenerate ones
    pub max_iterations: usize,
    /// Smallest consensus set accepted
    pub min_inliers: usize,
    /// Fixed RNG seed for reproducible fits
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            inlier_threshold_m: 5.0,
            max_iterations: 100,
            min_inliers: 3,
            seed: None,
        }
    }
}

impl ConsensusConfig {
    /// Fewest bearings the consensus fit will accept
    pub fn required_measurements(&self) -> usize {
        self.min_inliers.max(3)
    }
}

/// Best consensus set found
#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    /// Candidate position that produced the consensus
    pub candidate: Point2<f64>,
    pub inliers: Vec<bool>,
    /// Subsets drawn before stopping
    pub iterations: usize,
}

impl Consensus {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&i| i).count()
    }
}

/// Intersection of two bearing lines, `None` when they are (nearly) parallel
pub fn intersect(first: &BearingMeasurement, second: &BearingMeasurement) -> Option<Point2<f64>> {
    let (a1, b1, c1) = first.line_coefficients();
    let (a2, b2, c2) = second.line_coefficients();
    let m = Matrix2::new(a1, b1, a2, b2);
    // Unit normals, so |det| is the sine of the crossing angle
    if m.determinant().abs() < 1e-9 {
        return None;
    }
    let p = m.try_inverse()? * Vector2::new(-c1, -c2);
    Some(Point2::from(p))
}

/// Search for the largest set of bearings that agree on one emitter position.
///
/// Draws at most `max_iterations` two-bearing subsets; near-parallel subsets
/// are skipped but still count. Stops early once every bearing is an inlier.
/// Equal-sized consensus sets are ranked by their summed inlier distance.
pub fn consensus_inliers<R: Rng + ?Sized>(
    measurements: &[BearingMeasurement],
    config: &ConsensusConfig,
    rng: &mut R,
) -> Result<Consensus> {
    let n = measurements.len();
    let required = config.required_measurements();
    if n < required {
        return Err(LocalizationError::InsufficientMeasurements {
            available: n,
            required,
        });
    }

    let mut best: Option<(usize, f64, Consensus)> = None;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        iterations += 1;

        let pair = index::sample(rng, n, 2);
        let (i, j) = (pair.index(0), pair.index(1));
        let Some(candidate) = intersect(&measurements[i], &measurements[j]) else {
            trace!(i, j, "skipping near-parallel subset");
            continue;
        };

        let mut inliers = Vec::with_capacity(n);
        let mut count = 0;
        let mut spread = 0.0;
        for m in measurements {
            let d = m.perpendicular_distance(&candidate);
            let keep = d <= config.inlier_threshold_m;
            if keep {
                count += 1;
                spread += d;
            }
            inliers.push(keep);
        }

        let improves = match &best {
            None => true,
            Some((best_count, best_spread, _)) => {
                count > *best_count || (count == *best_count && spread < *best_spread)
            }
        };
        if improves {
            trace!(count, spread, x = candidate.x, y = candidate.y, "new consensus");
            best = Some((
                count,
                spread,
                Consensus {
                    candidate,
                    inliers,
                    iterations,
                },
            ));
        }

        if count == n {
            break;
        }
    }

    match best {
        Some((count, _, mut consensus)) if count >= config.min_inliers => {
            consensus.iterations = iterations;
            Ok(consensus)
        }
        other => Err(LocalizationError::NoConsensus {
            iterations,
            best_inliers: other.map_or(0, |(count, _, _)| count),
            required: config.min_inliers,
        }),
    }
}
