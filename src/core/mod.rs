//! Core types and constants for the direction-finding pipeline

pub mod angles;
pub mod constants;
pub mod types;

pub use angles::*;
pub use constants::*;
pub use types::*;
