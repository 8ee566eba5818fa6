//! RF field samplers: analytic free-space field and precomputed grids

use nalgebra::Point3;
use tracing::debug;

use crate::algorithms::propagation::total_received_power;
use crate::core::Emitter;
use crate::validation::error::{require_positive, LocalizationError, Result};

/// Scalar field strength at a 3D position
pub trait FieldSampler {
    fn sample(&self, position: &Point3<f64>) -> Result<f64>;
}

impl<F> FieldSampler for F
where
    F: Fn(&Point3<f64>) -> f64,
{
    fn sample(&self, position: &Point3<f64>) -> Result<f64> {
        Ok(self(position))
    }
}

/// Superposed Friis field of a set of emitters
#[derive(Debug, Clone)]
pub struct FreeSpaceField {
    emitters: Vec<Emitter>,
    wavelength: f64,
}

impl FreeSpaceField {
    pub fn new(emitters: Vec<Emitter>, wavelength: f64) -> Result<Self> {
        require_positive("wavelength", wavelength)?;
        Ok(Self {
            emitters,
            wavelength,
        })
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }
}

impl FieldSampler for FreeSpaceField {
    fn sample(&self, position: &Point3<f64>) -> Result<f64> {
        total_received_power(&self.emitters, position, self.wavelength)
    }
}

/// Field sampled on a cubic grid spanning `[0, extent]` on every axis.
///
/// Lookups truncate towards the lower grid node; there is no interpolation.
#[derive(Debug, Clone)]
pub struct FieldGrid {
    extent: f64,
    resolution: usize,
    values: Vec<f64>,
}

impl FieldGrid {
    /// Evaluate `sampler` at every one of `resolution³` evenly spaced nodes
    pub fn from_sampler<S: FieldSampler + ?Sized>(
        sampler: &S,
        extent: f64,
        resolution: usize,
    ) -> Result<Self> {
        require_positive("extent", extent)?;
        if resolution < 2 {
            return Err(LocalizationError::invalid(
                "resolution",
                resolution as f64,
                "grid needs at least 2 nodes per axis",
            ));
        }

        let step = extent / (resolution - 1) as f64;
        let fits_in_memory = |nodes: &usize| {
            nodes
                .checked_mul(std::mem::size_of::<f64>())
                .is_some_and(|bytes| bytes <= isize::MAX as usize)
        };
        let nodes = resolution
            .checked_pow(3)
            .filter(fits_in_memory)
            .ok_or_else(|| {
                LocalizationError::invalid("resolution", resolution as f64, "grid too large")
            })?;
        let mut values = Vec::with_capacity(nodes);
        for ix in 0..resolution {
            for iy in 0..resolution {
                for iz in 0..resolution {
                    let p = Point3::new(ix as f64 * step, iy as f64 * step, iz as f64 * step);
                    values.push(sampler.sample(&p)?);
                }
            }
        }
        debug!(extent, resolution, nodes = values.len(), "field grid populated");

        Ok(Self {
            extent,
            resolution,
            values,
        })
    }

    pub fn extent(&self) -> f64 {
        self.extent
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Grid node holding `position`, as `(ix, iy, iz)`
    pub fn node_index(&self, position: &Point3<f64>) -> Result<(usize, usize, usize)> {
        let axis = |value: f64, parameter: &'static str| -> Result<usize> {
            if !(0.0..=self.extent).contains(&value) {
                return Err(LocalizationError::invalid(parameter, value, "outside the field grid"));
            }
            Ok((value / self.extent * (self.resolution - 1) as f64) as usize)
        };
        Ok((
            axis(position.x, "x")?,
            axis(position.y, "y")?,
            axis(position.z, "z")?,
        ))
    }

    pub fn value_at_node(&self, ix: usize, iy: usize, iz: usize) -> Option<f64> {
        let r = self.resolution;
        if ix >= r || iy >= r || iz >= r {
            return None;
        }
        self.values.get((ix * r + iy) * r + iz).copied()
    }
}

impl FieldSampler for FieldGrid {
    fn sample(&self, position: &Point3<f64>) -> Result<f64> {
        let (ix, iy, iz) = self.node_index(position)?;
        self.value_at_node(ix, iy, iz).ok_or_else(|| {
            LocalizationError::invalid("position", position.x, "outside the field grid")
        })
    }
}
