//! Core data types for the direction-finding pipeline

use nalgebra::{Matrix2, Point2, Point3, Unit, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::angles::heading;
use crate::validation::error::{require_finite, require_positive, LocalizationError, Result};

/// Radio emitter with a fixed position and transmit power
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emitter {
    position: Point3<f64>,
    tx_power: f64,
}

impl Emitter {
    pub fn new(position: Point3<f64>, tx_power: f64) -> Result<Self> {
        require_positive("tx_power", tx_power)?;
        require_finite("emitter_position.x", position.x)?;
        require_finite("emitter_position.y", position.y)?;
        require_finite("emitter_position.z", position.z)?;
        Ok(Self { position, tx_power })
    }

    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    /// Transmit power (W)
    pub fn tx_power(&self) -> f64 {
        self.tx_power
    }
}

/// Directional receive element
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaElement {
    /// Element phase centre (m)
    pub position: Point3<f64>,
    /// Direction of maximum gain
    pub boresight: Unit<Vector3<f64>>,
    /// Beamwidth parameter σ of the pickup pattern
    pub beamwidth_std: f64,
}

impl AntennaElement {
    pub fn new(position: Point3<f64>, boresight: Vector3<f64>, beamwidth_std: f64) -> Result<Self> {
        require_positive("beamwidth_std", beamwidth_std)?;
        let norm = boresight.norm();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(LocalizationError::ZeroLengthVector {
                context: "antenna boresight",
            });
        }
        Ok(Self {
            position,
            boresight: Unit::new_normalize(boresight),
            beamwidth_std,
        })
    }
}

/// A single line-of-bearing: origin plus unit direction towards the emitter
///
/// Constructed only through validating constructors, so every instance has a
/// finite origin, a unit-length direction and a weight in `[0, 1]` if one is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BearingRecord", into = "BearingRecord")]
pub struct BearingMeasurement {
    origin: Point2<f64>,
    direction: Unit<Vector2<f64>>,
    weight: Option<f64>,
}

/// Serialized form of a [`BearingMeasurement`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearingRecord {
    /// Sensor position `[x, y]` (m)
    pub origin: [f64; 2],
    /// Bearing, CCW from +x (rad)
    pub angle_rad: f64,
    /// Optional confidence weight in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl BearingMeasurement {
    pub fn new(origin: Point2<f64>, direction: Vector2<f64>) -> Result<Self> {
        require_finite("origin.x", origin.x)?;
        require_finite("origin.y", origin.y)?;
        let norm = direction.norm();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(LocalizationError::ZeroLengthVector {
                context: "bearing direction",
            });
        }
        Ok(Self {
            origin,
            direction: Unit::new_normalize(direction),
            weight: None,
        })
    }

    pub fn from_angle(origin: Point2<f64>, angle: f64) -> Result<Self> {
        require_finite("bearing_angle", angle)?;
        Self::new(origin, Vector2::new(angle.cos(), angle.sin()))
    }

    /// Attach a confidence weight in `[0, 1]`
    pub fn with_weight(mut self, weight: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(LocalizationError::invalid(
                "weight",
                weight,
                "must lie in [0, 1]",
            ));
        }
        self.weight = Some(weight);
        Ok(self)
    }

    pub fn origin(&self) -> &Point2<f64> {
        &self.origin
    }

    pub fn direction(&self) -> &Unit<Vector2<f64>> {
        &self.direction
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Weight used by the solvers (unweighted bearings count fully)
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Bearing angle, CCW from +x
    pub fn angle(&self) -> f64 {
        heading(&self.direction)
    }

    /// Line through the origin along the bearing as `(a, b, c)` with `a·x + b·y + c = 0`.
    ///
    /// `(a, b)` is the unit normal, so `|a·x + b·y + c|` is a distance in meters.
    pub fn line_coefficients(&self) -> (f64, f64, f64) {
        let a = -self.direction.y;
        let b = self.direction.x;
        let c = -(a * self.origin.x + b * self.origin.y);
        (a, b, c)
    }

    /// Perpendicular distance from `point` to the bearing line (m)
    pub fn perpendicular_distance(&self, point: &Point2<f64>) -> f64 {
        let (a, b, c) = self.line_coefficients();
        (a * point.x + b * point.y + c).abs()
    }
}

impl TryFrom<BearingRecord> for BearingMeasurement {
    type Error = LocalizationError;

    fn try_from(record: BearingRecord) -> Result<Self> {
        let measurement =
            Self::from_angle(Point2::new(record.origin[0], record.origin[1]), record.angle_rad)?;
        match record.weight {
            Some(w) => measurement.with_weight(w),
            None => Ok(measurement),
        }
    }
}

impl From<BearingMeasurement> for BearingRecord {
    fn from(m: BearingMeasurement) -> Self {
        Self {
            origin: [m.origin.x, m.origin.y],
            angle_rad: m.angle(),
            weight: m.weight,
        }
    }
}

/// Solver used to produce a [`TriangulationResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriangulationMethod {
    /// Weighted perpendicular-distance least squares over all bearings
    LeastSquares,
    /// Consensus fit that rejects outlying bearings before refitting
    Robust,
}

/// Position uncertainty derived from the residual scatter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUncertainty {
    /// 2x2 position covariance (m²)
    pub covariance: Matrix2<f64>,
    /// 95% ellipse semi-major axis (m)
    pub semi_major_m: f64,
    /// 95% ellipse semi-minor axis (m)
    pub semi_minor_m: f64,
    /// Ellipse orientation, CCW from +x (rad)
    pub orientation_rad: f64,
    /// Circular error probable (m)
    pub cep_m: f64,
}

/// Emitter position estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriangulationResult {
    /// Estimated emitter position (m)
    pub position: Point2<f64>,
    pub method: TriangulationMethod,
    /// RMS perpendicular distance from the estimate to the bearings used (m)
    pub rms_residual_m: f64,
    /// Condition number of the final design matrix
    pub condition_number: f64,
    /// `true` for every input bearing used in the final fit
    pub inliers: Vec<bool>,
    /// Consensus iterations consumed (0 for plain least squares)
    pub iterations: usize,
    pub uncertainty: Option<PositionUncertainty>,
}

impl TriangulationResult {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&i| i).count()
    }

    /// Planar distance from the estimate to `truth` (m)
    pub fn error_to(&self, truth: &Point2<f64>) -> f64 {
        (self.position - truth).norm()
    }
}
