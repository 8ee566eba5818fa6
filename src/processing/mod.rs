//! Field sampling and synthetic scenario generation

pub mod field;
pub mod scenario;

pub use field::{FieldGrid, FieldSampler, FreeSpaceField};
pub use scenario::{
    PairObservation, PairPlacement, PairResponse, Scenario, ScenarioConfig, SensorPairConfig,
};
