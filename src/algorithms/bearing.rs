//! Amplitude-comparison bearing estimation from a squinted antenna pair
//!
//! Both elements are modelled with a Gaussian-in-angle pattern
//! `P(φ) = G0 · exp(-A ((φ - s)/ψ0)²)`, `A = ln 2`. Bearings are measured from
//! the boresight of element 1 towards element 2, which is squinted by `+Φ`;
//! the pair bisector therefore sits at `Φ/2`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::algorithms::directional::half_power_beamwidth;
use crate::core::{DB_SQUINT_CONSTANT, HALF_POWER_CONSTANT};
use crate::validation::error::{require_finite, require_positive, LocalizationError, Result};

/// Beam shape and squint of a two-element bearing sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BeamRecord", into = "BeamRecord")]
pub struct BeamGeometry {
    /// Half-power beamwidth ψ0 (rad)
    half_power_beamwidth: f64,
    /// Squint Φ between the two boresights (rad)
    squint: f64,
}

/// Serialized form of a [`BeamGeometry`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BeamRecord {
    pub half_power_beamwidth: f64,
    pub squint: f64,
}

impl TryFrom<BeamRecord> for BeamGeometry {
    type Error = LocalizationError;

    fn try_from(record: BeamRecord) -> Result<Self> {
        Self::new(record.half_power_beamwidth, record.squint)
    }
}

impl From<BeamGeometry> for BeamRecord {
    fn from(geometry: BeamGeometry) -> Self {
        Self {
            half_power_beamwidth: geometry.half_power_beamwidth,
            squint: geometry.squint,
        }
    }
}

impl Default for BeamGeometry {
    fn default() -> Self {
        Self {
            // Half-power width of the σ = 0.3 cosine pattern
            half_power_beamwidth: 0.506_145_483_078_355_6,
            squint: std::f64::consts::FRAC_PI_4,
        }
    }
}

impl BeamGeometry {
    pub fn new(half_power_beamwidth: f64, squint: f64) -> Result<Self> {
        require_positive("half_power_beamwidth", half_power_beamwidth)?;
        require_positive("squint", squint)?;
        Ok(Self {
            half_power_beamwidth,
            squint,
        })
    }

    /// Geometry for elements with the cosine pickup pattern of width `σ`
    pub fn from_beamwidth_std(beamwidth_std: f64, squint: f64) -> Result<Self> {
        Self::new(half_power_beamwidth(beamwidth_std)?, squint)
    }

    pub fn half_power_beamwidth(&self) -> f64 {
        self.half_power_beamwidth
    }

    pub fn squint(&self) -> f64 {
        self.squint
    }

    /// Power picked up by an element squinted by `squint_offset` for a
    /// source at `bearing`
    pub fn element_power(&self, peak_gain: f64, bearing: f64, squint_offset: f64) -> f64 {
        let x = (bearing - squint_offset) / self.half_power_beamwidth;
        peak_gain * (-HALF_POWER_CONSTANT * x * x).exp()
    }

    /// Noiseless `(P1, P2)` for a source at `bearing`
    pub fn pair_powers(&self, peak_gain: f64, bearing: f64) -> (f64, f64) {
        (
            self.element_power(peak_gain, bearing, 0.0),
            self.element_power(peak_gain, bearing, self.squint),
        )
    }

    /// `P1 / P2 = exp(A/ψ0² · (Φ² - 2Φφ))`
    pub fn power_ratio(&self, bearing: f64) -> f64 {
        let phi = self.squint;
        let scale = HALF_POWER_CONSTANT / self.half_power_beamwidth.powi(2);
        (scale * (phi * phi - 2.0 * phi * bearing)).exp()
    }

    /// Exact inversion of the pattern model from linear powers.
    ///
    /// `φ = ψ0² / (2AΦ) · (ln P2 - ln P1) + Φ/2`
    pub fn bearing_natural(&self, p1: f64, p2: f64) -> Result<f64> {
        let p1 = require_power("p1", p1)?;
        let p2 = require_power("p2", p2)?;
        let scale = self.half_power_beamwidth.powi(2) / (2.0 * HALF_POWER_CONSTANT * self.squint);
        let bearing = scale * (p2.ln() - p1.ln()) + self.squint / 2.0;
        trace!(p1, p2, bearing, "natural-log bearing");
        Ok(bearing)
    }

    /// Linearized bearing from powers in dB.
    ///
    /// `φ ≈ (ψ0 / (2 · 6.0202)) · Φ · (P2_dB - P1_dB) + Φ/2`. Matches
    /// [`bearing_natural`](Self::bearing_natural) at the crossover (equal
    /// powers) and drifts away linearly with the offset from the bisector;
    /// see [`approximation_error`](Self::approximation_error).
    pub fn bearing_db(&self, p1_db: f64, p2_db: f64) -> Result<f64> {
        require_finite("p1_db", p1_db)?;
        require_finite("p2_db", p2_db)?;
        Ok(self.half_power_beamwidth / (2.0 * DB_SQUINT_CONSTANT) * self.squint * (p2_db - p1_db)
            + self.squint / 2.0)
    }

    pub fn bearings_natural(&self, p1: &[f64], p2: &[f64]) -> Result<Vec<f64>> {
        check_lengths(p1, p2)?;
        p1.iter().zip(p2).map(|(&a, &b)| self.bearing_natural(a, b)).collect()
    }

    pub fn bearings_db(&self, p1_db: &[f64], p2_db: &[f64]) -> Result<Vec<f64>> {
        check_lengths(p1_db, p2_db)?;
        p1_db.iter().zip(p2_db).map(|(&a, &b)| self.bearing_db(a, b)).collect()
    }

    /// `|dB form - true bearing|` for a noiseless pair observing `bearing`
    pub fn approximation_error(&self, bearing: f64) -> Result<f64> {
        let (p1, p2) = self.pair_powers(1.0, bearing);
        let p1_db = 10.0 * require_power("p1", p1)?.log10();
        let p2_db = 10.0 * require_power("p2", p2)?.log10();
        Ok((self.bearing_db(p1_db, p2_db)? - bearing).abs())
    }

    /// Convert a bearing measured from element 1 to one measured from the pair bisector
    pub fn to_bisector_frame(&self, bearing: f64) -> f64 {
        bearing - self.squint / 2.0
    }

    pub fn from_bisector_frame(&self, offset: f64) -> f64 {
        offset + self.squint / 2.0
    }
}

/// Exact bearing from linear powers, see [`BeamGeometry::bearing_natural`]
pub fn bearing_from_power_natural(
    p1: f64,
    p2: f64,
    squint: f64,
    half_power_beamwidth: f64,
) -> Result<f64> {
    BeamGeometry::new(half_power_beamwidth, squint)?.bearing_natural(p1, p2)
}

/// Linearized bearing from dB powers, see [`BeamGeometry::bearing_db`]
pub fn bearing_from_power_db(
    p1_db: f64,
    p2_db: f64,
    squint: f64,
    half_power_beamwidth: f64,
) -> Result<f64> {
    BeamGeometry::new(half_power_beamwidth, squint)?.bearing_db(p1_db, p2_db)
}

fn require_power(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(LocalizationError::invalid(
            parameter,
            value,
            "power must be positive and finite for a log-domain bearing",
        ))
    }
}

fn check_lengths(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(LocalizationError::LengthMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}
