//! Free-space propagation (Friis transmission equation)

use nalgebra::Point3;
use std::f64::consts::PI;
use tracing::trace;

use crate::core::{Emitter, MIN_DISTANCE_M, SPEED_OF_LIGHT};
use crate::validation::error::{require_finite, require_positive, LocalizationError, Result};

/// Wavelength (m) of a carrier at `frequency_hz`
pub fn wavelength_from_frequency(frequency_hz: f64) -> Result<f64> {
    require_positive("frequency_hz", frequency_hz)?;
    Ok(SPEED_OF_LIGHT / frequency_hz)
}

/// Free-space path loss `(4πd/λ)²` as a linear factor
pub fn free_space_path_loss(distance: f64, wavelength: f64) -> Result<f64> {
    require_positive("wavelength", wavelength)?;
    require_finite("distance", distance)?;
    let d = distance.max(MIN_DISTANCE_M);
    Ok((4.0 * PI * d / wavelength).powi(2))
}

/// Received power (linear, same unit as `tx_power`) at `rx_position`
pub fn received_power(
    tx_power: f64,
    tx_position: &Point3<f64>,
    rx_position: &Point3<f64>,
    wavelength: f64,
) -> Result<f64> {
    require_positive("tx_power", tx_power)?;
    let distance = (tx_position - rx_position).norm();
    let loss = free_space_path_loss(distance, wavelength)?;
    trace!(distance, loss, "friis received power");
    Ok(tx_power / loss)
}

/// Received power in decibels relative to the unit of `tx_power`
pub fn received_power_db(
    tx_power: f64,
    tx_position: &Point3<f64>,
    rx_position: &Point3<f64>,
    wavelength: f64,
) -> Result<f64> {
    to_decibels(received_power(tx_power, tx_position, rx_position, wavelength)?)
}

/// Sum of every emitter's contribution at `rx_position`.
///
/// Powers add linearly; there is no coherent (phase) combining.
pub fn total_received_power(
    emitters: &[Emitter],
    rx_position: &Point3<f64>,
    wavelength: f64,
) -> Result<f64> {
    emitters.iter().try_fold(0.0, |acc, emitter| {
        received_power(emitter.tx_power(), emitter.position(), rx_position, wavelength)
            .map(|p| acc + p)
    })
}

pub fn to_decibels(power: f64) -> Result<f64> {
    if !(power.is_finite() && power > 0.0) {
        return Err(LocalizationError::invalid(
            "power",
            power,
            "decibels need a positive finite power",
        ));
    }
    Ok(10.0 * power.log10())
}

pub fn from_decibels(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}
