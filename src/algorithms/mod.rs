//! Bearing estimation and emitter localization algorithms

pub mod bearing;
pub mod consensus;
pub mod directional;
pub mod propagation;
pub mod switched_array;
pub mod triangulation;

pub use bearing::BeamGeometry;
pub use consensus::{Consensus, ConsensusConfig};
pub use switched_array::{ArrayMeasurement, DirectionEstimate, SwitchedArray};
pub use triangulation::{TriangulationConfig, Triangulator};
