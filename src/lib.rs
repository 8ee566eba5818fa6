//! Radio Direction Finding Geolocation
//!
//! Estimates the bearing to an RF emitter from the powers picked up by squinted
//! directional antenna pairs or a switched circular array, and fuses many such
//! bearings into an emitter position by least squares or a consensus fit that
//! rejects outlying bearings.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    AntennaElement, BearingMeasurement, Emitter, PositionUncertainty, TriangulationMethod,
    TriangulationResult, SPEED_OF_LIGHT,
};
pub use algorithms::bearing::{bearing_from_power_db, bearing_from_power_natural, BeamGeometry};
pub use algorithms::consensus::ConsensusConfig;
pub use algorithms::switched_array::{DirectionEstimate, SwitchedArray};
pub use algorithms::triangulation::{TriangulationConfig, Triangulator};
pub use processing::field::{FieldSampler, FreeSpaceField};
pub use processing::scenario::{Scenario, ScenarioConfig};
pub use utils::config::{ConfigurationManager, LocatorConfig};
pub use validation::accuracy::AccuracyValidator;
pub use validation::error::{ErrorKind, LocalizationError, Result};
