//! Synthetic bearing scenarios: random sensor-pair placement and observation
//!
//! Each sensor pair is two directional elements a short baseline apart whose
//! boresights straddle the pair heading by `∓Φ/2`. Observing an emitter means
//! sampling the field at each element, applying the element response and
//! inverting the power pair into a bearing line anchored at the pair centre.

use nalgebra::{Point2, Point3, Vector2, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, trace};

use crate::algorithms::bearing::BeamGeometry;
use crate::algorithms::directional::angular_gain;
use crate::algorithms::propagation::from_decibels;
use crate::core::{heading, wrap_to_pi, AntennaElement, BearingMeasurement, Emitter};
use crate::processing::field::FieldSampler;
use crate::validation::error::{require_finite, require_positive, LocalizationError, Result};

/// Element response used when synthesising pair powers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairResponse {
    /// Gaussian-in-angle beam; the bearing inversion is exact for it
    GaussianBeam,
    /// `exp(-(1 - cosθ)/(2σ²))` pickup pattern; inversion is approximate off the bisector
    CosinePattern,
}

/// Physical description of a two-element bearing sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPairConfig {
    /// Beamwidth σ of each element's pickup pattern
    pub beamwidth_std: f64,
    /// Angle Φ between the two boresights (rad)
    pub squint_rad: f64,
    /// Distance between the element phase centres (m)
    pub separation_m: f64,
}

impl Default for SensorPairConfig {
    fn default() -> Self {
        Self {
            beamwidth_std: 0.3,
            squint_rad: PI / 4.0,
            separation_m: 0.1,
        }
    }
}

impl SensorPairConfig {
    pub fn geometry(&self) -> Result<BeamGeometry> {
        BeamGeometry::from_beamwidth_std(self.beamwidth_std, self.squint_rad)
    }
}

/// Scenario generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Number of sensor pairs to place
    pub pair_count: usize,
    /// Lower bound of the square placement area on x and y (m)
    pub area_min_m: f64,
    /// Upper bound of the square placement area on x and y (m)
    pub area_max_m: f64,
    /// Mounting height of every pair (m)
    pub height_m: f64,
    /// Emitter position `[x, y, z]` (m)
    pub emitter_position: [f64; 3],
    /// Emitter transmit power (W)
    pub emitter_power: f64,
    /// Standard deviation of log-normal power noise per element (dB); 0 disables noise
    pub power_noise_db: f64,
    pub response: PairResponse,
    /// Fixed RNG seed for reproducible placements
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            pair_count: 10,
            area_min_m: 0.0,
            area_max_m: 500.0,
            height_m: 250.0,
            emitter_position: [360.0, 120.0, 250.0],
            emitter_power: 20.0,
            power_noise_db: 0.0,
            response: PairResponse::GaussianBeam,
            seed: None,
        }
    }
}

impl ScenarioConfig {
    pub fn emitter(&self) -> Result<Emitter> {
        let [x, y, z] = self.emitter_position;
        Emitter::new(Point3::new(x, y, z), self.emitter_power)
    }
}

/// Where a sensor pair sits and which way it faces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairPlacement {
    /// Midpoint between the two elements (m)
    pub center: Point3<f64>,
    /// Heading of the pair bisector in the horizontal plane, CCW from +x (rad)
    pub heading_rad: f64,
}

/// Result of one sensor pair observing the emitter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairObservation {
    pub placement: PairPlacement,
    /// Power picked up by element 1 (boresight at `heading - Φ/2`)
    pub p1: f64,
    /// Power picked up by element 2 (boresight at `heading + Φ/2`)
    pub p2: f64,
    /// Bearing from element 1's boresight (rad)
    pub bearing_rad: f64,
    pub measurement: BearingMeasurement,
}

/// Generates pair placements and turns them into bearing measurements
#[derive(Debug, Clone)]
pub struct Scenario {
    config: ScenarioConfig,
    pair: SensorPairConfig,
    geometry: BeamGeometry,
}

impl Scenario {
    pub fn new(config: ScenarioConfig, pair: SensorPairConfig) -> Result<Self> {
        if !(config.area_max_m > config.area_min_m) {
            return Err(LocalizationError::invalid(
                "area_max_m",
                config.area_max_m,
                "must exceed area_min_m",
            ));
        }
        require_finite("area_min_m", config.area_min_m)?;
        require_finite("area_max_m", config.area_max_m)?;
        require_finite("area_span_m", config.area_max_m - config.area_min_m)?;
        require_finite("height_m", config.height_m)?;
        if !(config.power_noise_db >= 0.0 && config.power_noise_db.is_finite()) {
            return Err(LocalizationError::invalid(
                "power_noise_db",
                config.power_noise_db,
                "must be non-negative and finite",
            ));
        }
        require_positive("separation_m", pair.separation_m)?;
        let geometry = pair.geometry()?;
        Ok(Self {
            config,
            pair,
            geometry,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn geometry(&self) -> &BeamGeometry {
        &self.geometry
    }

    /// Uniformly random pair centres in the placement square, facing any horizontal direction
    pub fn generate_placements<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<PairPlacement> {
        let area = Uniform::new(self.config.area_min_m, self.config.area_max_m);
        let heading = Uniform::new(-PI, PI);
        (0..self.config.pair_count)
            .map(|_| PairPlacement {
                center: Point3::new(area.sample(rng), area.sample(rng), self.config.height_m),
                heading_rad: heading.sample(rng),
            })
            .collect()
    }

    /// The two elements of a pair, element 1 first.
    ///
    /// Elements sit `±separation/2` along the horizontal perpendicular of the
    /// heading, with boresights rotated `∓Φ/2` from it.
    pub fn elements(&self, placement: &PairPlacement) -> Result<[AntennaElement; 2]> {
        let h = placement.heading_rad;
        let half_squint = self.geometry.squint() / 2.0;
        let right = Vector3::new(h.sin(), -h.cos(), 0.0) * (self.pair.separation_m / 2.0);
        let boresight = |angle: f64| Vector3::new(angle.cos(), angle.sin(), 0.0);

        Ok([
            AntennaElement::new(
                placement.center + right,
                boresight(h - half_squint),
                self.pair.beamwidth_std,
            )?,
            AntennaElement::new(
                placement.center - right,
                boresight(h + half_squint),
                self.pair.beamwidth_std,
            )?,
        ])
    }

    /// Observe `emitter` from one pair and invert the powers into a bearing line.
    ///
    /// Returns `None` when either element's power is not a normal positive
    /// float, e.g. a narrow beam facing away from the emitter underflows to
    /// zero; such a pair yields no usable bearing.
    pub fn observe<F, R>(
        &self,
        placement: &PairPlacement,
        emitter: &Emitter,
        field: &F,
        rng: &mut R,
    ) -> Result<Option<PairObservation>>
    where
        F: FieldSampler + ?Sized,
        R: Rng + ?Sized,
    {
        let elements = self.elements(placement)?;
        let to_emitter = Vector2::new(
            emitter.position().x - placement.center.x,
            emitter.position().y - placement.center.y,
        );
        if to_emitter.norm() == 0.0 {
            return Err(LocalizationError::ZeroLengthVector {
                context: "pair centre to emitter",
            });
        }
        let offset = wrap_to_pi(heading(&to_emitter) - placement.heading_rad);
        let half_squint = self.geometry.squint() / 2.0;

        let mut powers = [0.0; 2];
        for (k, element) in elements.iter().enumerate() {
            let field_power = field.sample(&element.position)?;
            powers[k] = match self.config.response {
                PairResponse::GaussianBeam => {
                    let element_offset = if k == 0 {
                        offset + half_squint
                    } else {
                        offset - half_squint
                    };
                    let psi0 = self.geometry.half_power_beamwidth();
                    field_power * angular_gain(element_offset, psi0)?
                }
                PairResponse::CosinePattern => {
                    element.receive(field_power, emitter.position())?.received
                }
            };
        }

        if self.config.power_noise_db > 0.0 {
            let sigma = self.config.power_noise_db;
            let noise = Normal::new(0.0, sigma).map_err(|_| {
                LocalizationError::invalid("power_noise_db", sigma, "invalid noise level")
            })?;
            for p in powers.iter_mut() {
                *p *= from_decibels(noise.sample(rng));
            }
        }

        let [p1, p2] = powers;
        if !(p1.is_normal() && p2.is_normal()) {
            trace!(p1, p2, heading = placement.heading_rad, "pair cannot resolve the emitter");
            return Ok(None);
        }
        let bearing_rad = self.geometry.bearing_natural(p1, p2)?;
        let world_angle = placement.heading_rad + self.geometry.to_bisector_frame(bearing_rad);
        let origin = Point2::new(placement.center.x, placement.center.y);
        let measurement = BearingMeasurement::from_angle(origin, world_angle)?;
        trace!(p1, p2, bearing_rad, world_angle, "pair observation");

        Ok(Some(PairObservation {
            placement: *placement,
            p1,
            p2,
            bearing_rad,
            measurement,
        }))
    }

    /// Place `pair_count` pairs and observe `emitter` from each.
    ///
    /// Pairs that cannot resolve the emitter are left out, so the result may
    /// hold fewer than `pair_count` observations.
    pub fn run<F, R>(
        &self,
        emitter: &Emitter,
        field: &F,
        rng: &mut R,
    ) -> Result<Vec<PairObservation>>
    where
        F: FieldSampler + ?Sized,
        R: Rng + ?Sized,
    {
        let placements = self.generate_placements(rng);
        let mut observations = Vec::with_capacity(placements.len());
        for placement in &placements {
            if let Some(observation) = self.observe(placement, emitter, field, rng)? {
                observations.push(observation);
            }
        }
        let dropped = placements.len() - observations.len();
        if dropped > 0 {
            debug!(dropped, "pairs produced no usable bearing");
        }
        debug!(pairs = observations.len(), "scenario observed");
        Ok(observations)
    }
}

/// Bearing lines of a set of observations
pub fn measurements_of(observations: &[PairObservation]) -> Vec<BearingMeasurement> {
    observations.iter().map(|o| o.measurement.clone()).collect()
}
