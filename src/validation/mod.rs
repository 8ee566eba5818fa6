//! Error types and accuracy validation

pub mod accuracy;
pub mod error;

pub use accuracy::AccuracyValidator;
pub use error::{ErrorKind, LocalizationError, Result};
