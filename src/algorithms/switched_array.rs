//! Switched circular-array direction finder
//!
//! `N` elements sit evenly on a circle of radius `r` at angles `2πi/N`. The
//! strongest element gives a coarse bearing which is refined towards the
//! stronger of its two neighbours in proportion to their power ratio.

use nalgebra::Point2;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, trace};

use crate::core::{
    angle_to_vector, wrap_to_pi, BearingMeasurement, CONFIDENCE_EPSILON, MIN_DISTANCE_M,
};
use crate::validation::error::{require_finite, require_positive, LocalizationError, Result};

/// Circular array of identical switched elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArrayGeometry", into = "ArrayGeometry")]
pub struct SwitchedArray {
    element_count: usize,
    radius: f64,
    element_angles: Vec<f64>,
}

/// Serialized form of a [`SwitchedArray`]; element angles are rebuilt on load
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArrayGeometry {
    pub element_count: usize,
    /// Array radius (m)
    pub radius: f64,
}

impl TryFrom<ArrayGeometry> for SwitchedArray {
    type Error = LocalizationError;

    fn try_from(geometry: ArrayGeometry) -> Result<Self> {
        Self::new(geometry.element_count, geometry.radius)
    }
}

impl From<SwitchedArray> for ArrayGeometry {
    fn from(array: SwitchedArray) -> Self {
        Self {
            element_count: array.element_count,
            radius: array.radius,
        }
    }
}

/// Direction estimate from one set of element powers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionEstimate {
    /// Estimated angle of arrival (rad); not wrapped
    pub angle: f64,
    /// Strongest element's share of total power
    pub confidence: f64,
    /// Index of the strongest element
    pub peak_element: usize,
}

/// Outcome of a simulated measurement cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrayMeasurement {
    /// True angle of arrival (rad)
    pub true_angle: f64,
    pub estimate: DirectionEstimate,
    /// Wrapped absolute angular error (degrees)
    pub error_deg: f64,
    /// Noise standard deviation used in the simulation
    pub noise_level: f64,
}

impl Default for SwitchedArray {
    fn default() -> Self {
        Self::with_geometry(8, 1.0)
    }
}

impl SwitchedArray {
    pub fn new(element_count: usize, radius: f64) -> Result<Self> {
        if element_count < 3 {
            return Err(LocalizationError::invalid(
                "element_count",
                element_count as f64,
                "a circular array needs at least 3 elements",
            ));
        }
        require_positive("radius", radius)?;
        Ok(Self::with_geometry(element_count, radius))
    }

    fn with_geometry(element_count: usize, radius: f64) -> Self {
        let element_angles = (0..element_count)
            .map(|i| 2.0 * PI * i as f64 / element_count as f64)
            .collect();
        Self {
            element_count,
            radius,
            element_angles,
        }
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Boresight angle of every element (rad)
    pub fn element_angles(&self) -> &[f64] {
        &self.element_angles
    }

    pub fn element_position(&self, index: usize) -> Option<Point2<f64>> {
        self.element_angles
            .get(index)
            .map(|a| Point2::new(self.radius * a.cos(), self.radius * a.sin()))
    }

    /// Angular spacing between neighbouring elements (rad)
    pub fn element_spacing(&self) -> f64 {
        2.0 * PI / self.element_count as f64
    }

    /// Powers seen by each element for a source at `signal_angle`.
    ///
    /// The source is placed on the array circle and attenuated by inverse
    /// square distance (offset by `1e-6` m), then i.i.d. Gaussian noise with
    /// standard deviation `noise_level` is added to every element.
    pub fn simulate_received_power<R: Rng + ?Sized>(
        &self,
        signal_angle: f64,
        signal_strength: f64,
        noise_level: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        require_finite("signal_angle", signal_angle)?;
        require_finite("signal_strength", signal_strength)?;
        let noise = Normal::new(0.0, noise_level).map_err(|_| {
            LocalizationError::invalid(
                "noise_level",
                noise_level,
                "must be non-negative and finite",
            )
        })?;

        let source = angle_to_vector(signal_angle, self.radius);
        let powers = self
            .element_angles
            .iter()
            .map(|a| {
                let element = angle_to_vector(*a, self.radius);
                let d = (element - source).norm() + MIN_DISTANCE_M;
                signal_strength / (d * d) + noise.sample(rng)
            })
            .collect();
        Ok(powers)
    }

    /// Bearing and confidence from one power reading per element.
    ///
    /// Ties for the peak go to the lowest index. The neighbour used for
    /// interpolation is `k+1` only when it is strictly stronger than `k-1`.
    /// A non-positive peak yields no interpolation offset.
    pub fn estimate_direction(&self, powers: &[f64]) -> Result<DirectionEstimate> {
        if powers.len() != self.element_count {
            return Err(LocalizationError::LengthMismatch {
                expected: self.element_count,
                actual: powers.len(),
            });
        }
        if let Some(bad) = powers.iter().find(|p| !p.is_finite()) {
            return Err(LocalizationError::invalid("element_power", *bad, "must be finite"));
        }

        let mut peak = 0;
        for (i, &p) in powers.iter().enumerate().skip(1) {
            if p > powers[peak] {
                peak = i;
            }
        }

        let n = self.element_count;
        let next = (peak + 1) % n;
        let prev = (peak + n - 1) % n;
        let peak_power = powers[peak];
        let half_spacing = self.element_spacing() / 2.0;

        let angle = if peak_power > 0.0 {
            if powers[next] > powers[prev] {
                self.element_angles[peak] + powers[next] / peak_power * half_spacing
            } else {
                self.element_angles[peak] - powers[prev] / peak_power * half_spacing
            }
        } else {
            self.element_angles[peak]
        };

        let total: f64 = powers.iter().sum();
        let confidence = peak_power / (total + CONFIDENCE_EPSILON);
        trace!(peak, angle, confidence, "switched-array estimate");

        Ok(DirectionEstimate {
            angle,
            confidence,
            peak_element: peak,
        })
    }

    /// Simulate a unit-strength source at `signal_angle` with the given SNR and
    /// estimate its direction
    pub fn process_measurement<R: Rng + ?Sized>(
        &self,
        signal_angle: f64,
        snr_db: f64,
        rng: &mut R,
    ) -> Result<ArrayMeasurement> {
        let noise_level = snr_db_to_noise_level(snr_db)?;
        let powers = self.simulate_received_power(signal_angle, 1.0, noise_level, rng)?;
        let estimate = self.estimate_direction(&powers)?;
        let error_deg = wrap_to_pi(estimate.angle - signal_angle).abs().to_degrees();
        debug!(
            true_deg = signal_angle.to_degrees(),
            est_deg = estimate.angle.to_degrees(),
            error_deg,
            confidence = estimate.confidence,
            "switched-array measurement"
        );
        Ok(ArrayMeasurement {
            true_angle: signal_angle,
            estimate,
            error_deg,
            noise_level,
        })
    }

    /// Run [`process_measurement`](Self::process_measurement) for each angle
    pub fn sweep<R: Rng + ?Sized>(
        &self,
        angles: &[f64],
        snr_db: f64,
        rng: &mut R,
    ) -> Result<Vec<ArrayMeasurement>> {
        angles
            .iter()
            .map(|&a| self.process_measurement(a, snr_db, rng))
            .collect()
    }
}

impl DirectionEstimate {
    /// Bearing line from an array centred at `origin`, weighted by confidence
    pub fn to_measurement(&self, origin: Point2<f64>) -> Result<BearingMeasurement> {
        BearingMeasurement::from_angle(origin, self.angle)?
            .with_weight(self.confidence.clamp(0.0, 1.0))
    }
}

/// Noise standard deviation for a unit-power signal at `snr_db`: `1 / 10^(snr/10)`
pub fn snr_db_to_noise_level(snr_db: f64) -> Result<f64> {
    require_finite("snr_db", snr_db)?;
    Ok(1.0 / 10f64.powf(snr_db / 10.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_element_layout() {
        let array = SwitchedArray::new(8, 1.0).unwrap();
        assert_eq!(array.element_angles().len(), 8);
        assert_abs_diff_eq!(array.element_angles()[2], PI / 2.0, epsilon = 1e-12);
        let p = array.element_position(4).unwrap();
        assert_abs_diff_eq!(p.x, -1.0, epsilon = 1e-12);
        assert!(array.element_position(8).is_none());
        assert_eq!(SwitchedArray::default(), array);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(SwitchedArray::new(2, 1.0).is_err());
        assert!(SwitchedArray::new(8, 0.0).is_err());
        assert!(SwitchedArray::new(8, f64::NAN).is_err());
    }

    #[test]
    fn test_json_rebuilds_element_angles() {
        let array = SwitchedArray::new(4, 2.0).unwrap();
        let json = serde_json::to_string(&array).unwrap();
        assert!(!json.contains("element_angles"));

        let loaded: SwitchedArray = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, array);

        // Stale angle lists are ignored and the layout is rebuilt from the count
        let stale: SwitchedArray =
            serde_json::from_str(r#"{"element_count":4,"radius":1.0,"element_angles":[]}"#)
                .unwrap();
        assert_eq!(stale.element_angles().len(), 4);
        assert!(stale.estimate_direction(&[1.0, 0.5, 0.1, 0.2]).is_ok());
    }

    #[test]
    fn test_json_rejects_invalid_geometry() {
        for json in [
            r#"{"element_count":0,"radius":1.0}"#,
            r#"{"element_count":2,"radius":1.0}"#,
            r#"{"element_count":8,"radius":-1.0}"#,
        ] {
            assert!(serde_json::from_str::<SwitchedArray>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn test_noiseless_boresight_signal() {
        let array = SwitchedArray::new(8, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for k in 0..8 {
            let theta = array.element_angles()[k];
            let powers = array.simulate_received_power(theta, 1.0, 0.0, &mut rng).unwrap();
            let est = array.estimate_direction(&powers).unwrap();
            assert_eq!(est.peak_element, k);
            assert_abs_diff_eq!(est.angle, theta, epsilon = 1e-6);
            assert_relative_eq!(est.confidence, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_interpolation_towards_stronger_neighbour() {
        let array = SwitchedArray::new(4, 1.0).unwrap();
        let spacing = PI / 2.0;

        let est = array.estimate_direction(&[1.0, 0.5, 0.1, 0.2]).unwrap();
        assert_eq!(est.peak_element, 0);
        assert_abs_diff_eq!(est.angle, 0.5 * spacing / 2.0, epsilon = 1e-12);

        let est = array.estimate_direction(&[1.0, 0.2, 0.1, 0.5]).unwrap();
        assert_abs_diff_eq!(est.angle, -0.5 * spacing / 2.0, epsilon = 1e-12);

        assert_relative_eq!(est.confidence, 1.0 / (1.8 + CONFIDENCE_EPSILON), max_relative = 1e-12);
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let array = SwitchedArray::new(4, 1.0).unwrap();
        let est = array.estimate_direction(&[0.2, 0.9, 0.9, 0.1]).unwrap();
        assert_eq!(est.peak_element, 1);
        // Neighbour tie goes to the previous element
        let est = array.estimate_direction(&[0.3, 0.9, 0.3, 0.1]).unwrap();
        assert_abs_diff_eq!(est.angle, PI / 2.0 - (0.3 / 0.9) * PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_powers() {
        let array = SwitchedArray::new(4, 1.0).unwrap();
        let est = array.estimate_direction(&[0.0; 4]).unwrap();
        assert_eq!(est.peak_element, 0);
        assert_eq!(est.angle, 0.0);
        assert_eq!(est.confidence, 0.0);

        assert!(matches!(
            array.estimate_direction(&[1.0, 2.0]),
            Err(LocalizationError::LengthMismatch { expected: 4, actual: 2 })
        ));
        assert!(array.estimate_direction(&[1.0, f64::NAN, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_process_measurement_high_snr() {
        let array = SwitchedArray::new(8, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let m = array.process_measurement(array.element_angles()[3], 40.0, &mut rng).unwrap();
        assert!(m.error_deg < 1e-3);
        assert_relative_eq!(m.noise_level, 1e-4, max_relative = 1e-12);
        assert!(m.estimate.confidence > 0.99);
    }

    #[test]
    fn test_error_is_wrapped() {
        let array = SwitchedArray::new(8, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        // Element 0 sits at angle 0, which is the same direction as 2π
        let m = array.process_measurement(2.0 * PI, 60.0, &mut rng).unwrap();
        assert!(m.error_deg < 1e-3);
    }

    #[test]
    fn test_negative_noise_rejected() {
        let array = SwitchedArray::default();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(array.simulate_received_power(0.0, 1.0, -0.1, &mut rng).is_err());
    }

    #[test]
    fn test_estimate_to_measurement() {
        let est = DirectionEstimate {
            angle: PI / 2.0,
            confidence: 1.3,
            peak_element: 2,
        };
        let m = est.to_measurement(Point2::new(5.0, 5.0)).unwrap();
        assert_eq!(m.weight(), Some(1.0));
        assert_abs_diff_eq!(m.angle(), PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_snr_conversion() {
        assert_relative_eq!(snr_db_to_noise_level(20.0).unwrap(), 0.01, max_relative = 1e-12);
        assert_relative_eq!(snr_db_to_noise_level(0.0).unwrap(), 1.0, max_relative = 1e-12);
    }
}
