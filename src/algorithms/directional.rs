//! Directional pickup pattern of a single antenna element

use nalgebra::{Point3, Vector3};
use serde::Serialize;

use crate::core::{AntennaElement, HALF_POWER_CONSTANT};
use crate::validation::error::{require_finite, require_positive, LocalizationError, Result};

/// Raw field sample and what the directional element actually picks up
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionalSample {
    /// Isotropic field amplitude at the element
    pub field: f64,
    /// `field` scaled by the element's directional gain
    pub received: f64,
}

/// Bell-shaped gain `exp(-(1 - cosθ) / (2σ²))`.
///
/// Equals 1 on boresight and decreases monotonically with the off-axis angle;
/// the pattern has no side lobes or nulls.
pub fn directional_gain(cos_theta: f64, beamwidth_std: f64) -> Result<f64> {
    require_positive("beamwidth_std", beamwidth_std)?;
    if cos_theta.is_nan() {
        return Err(LocalizationError::invalid(
            "cos_theta",
            cos_theta,
            "must be a number",
        ));
    }
    let c = cos_theta.clamp(-1.0, 1.0);
    Ok((-(1.0 - c) / (2.0 * beamwidth_std * beamwidth_std)).exp())
}

/// Apply the directional gain of an element at `antenna_position` facing
/// `antenna_direction` to a raw field sample
pub fn received_signal(
    field_amplitude: f64,
    emitter_position: &Point3<f64>,
    antenna_position: &Point3<f64>,
    antenna_direction: &Vector3<f64>,
    beamwidth_std: f64,
) -> Result<DirectionalSample> {
    require_finite("field_amplitude", field_amplitude)?;
    let to_emitter = emitter_position - antenna_position;
    let d = to_emitter.norm();
    if !(d.is_finite() && d > 0.0) {
        return Err(LocalizationError::ZeroLengthVector {
            context: "antenna to emitter",
        });
    }
    let n = antenna_direction.norm();
    if !(n.is_finite() && n > 0.0) {
        return Err(LocalizationError::ZeroLengthVector {
            context: "antenna boresight",
        });
    }

    let cos_theta = to_emitter.dot(antenna_direction) / (d * n);
    let gain = directional_gain(cos_theta, beamwidth_std)?;
    Ok(DirectionalSample {
        field: field_amplitude,
        received: field_amplitude * gain,
    })
}

impl AntennaElement {
    /// Sample picked up by this element from an emitter at `emitter_position`
    pub fn receive(
        &self,
        field_amplitude: f64,
        emitter_position: &Point3<f64>,
    ) -> Result<DirectionalSample> {
        received_signal(
            field_amplitude,
            emitter_position,
            &self.position,
            &self.boresight,
            self.beamwidth_std,
        )
    }

    pub fn half_power_beamwidth(&self) -> Result<f64> {
        half_power_beamwidth(self.beamwidth_std)
    }
}

/// Off-boresight angle at which the cosine pattern drops to half power.
///
/// Solves `exp(-(1 - cosψ0) / (2σ²)) = 0.5`, i.e. `ψ0 = acos(1 - 2σ² ln 2)`.
/// Fails when σ is so wide that the pattern never falls to half power.
pub fn half_power_beamwidth(beamwidth_std: f64) -> Result<f64> {
    require_positive("beamwidth_std", beamwidth_std)?;
    let c = 1.0 - 2.0 * beamwidth_std * beamwidth_std * HALF_POWER_CONSTANT;
    if c < -1.0 {
        return Err(LocalizationError::invalid(
            "beamwidth_std",
            beamwidth_std,
            "pattern never falls to half power",
        ));
    }
    Ok(c.acos())
}

/// Gaussian-in-angle gain `exp(-A (offset/ψ0)²)` with `A = ln 2`
pub fn angular_gain(offset: f64, half_power_beamwidth: f64) -> Result<f64> {
    require_positive("half_power_beamwidth", half_power_beamwidth)?;
    require_finite("offset", offset)?;
    Ok((-HALF_POWER_CONSTANT * (offset / half_power_beamwidth).powi(2)).exp())
}
