//! Error taxonomy for bearing estimation and triangulation

use thiserror::Error;

/// Result type for localization operations
pub type Result<T> = std::result::Result<T, LocalizationError>;

/// Errors raised by the estimation pipeline.
///
/// Nothing is recovered silently: every failure surfaces to the immediate
/// caller with enough context to decide whether to retry with different data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocalizationError {
    /// A scalar parameter is out of its valid domain
    #[error("Invalid {parameter} = {value}: {reason}")]
    InvalidInput {
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A direction or displacement vector has zero (or non-finite) length
    #[error("Zero-length vector: {context}")]
    ZeroLengthVector { context: &'static str },

    /// Paired inputs disagree in length
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Not enough measurements for the requested method
    #[error("Insufficient measurements: {available} available, {required} required")]
    InsufficientMeasurements { available: usize, required: usize },

    /// The design matrix is singular or too ill-conditioned to trust
    #[error(
        "Degenerate geometry over {measurement_count} bearings (condition {condition_number:.3e})"
    )]
    DegenerateGeometry {
        condition_number: f64,
        measurement_count: usize,
    },

    /// The consensus fit never found enough agreeing bearings
    #[error(
        "No consensus after {iterations} iterations: {best_inliers} inliers, {required} required"
    )]
    NoConsensus {
        iterations: usize,
        best_inliers: usize,
        required: usize,
    },
}

/// Coarse classification of [`LocalizationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller passed malformed data
    InvalidInput,
    /// Inputs were well-formed but the geometry cannot be solved
    NumericalDegeneracy,
    /// The data did not agree well enough to produce an estimate
    StatisticalFailure,
}

impl LocalizationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. }
            | Self::ZeroLengthVector { .. }
            | Self::LengthMismatch { .. } => ErrorKind::InvalidInput,
            Self::InsufficientMeasurements { .. } | Self::DegenerateGeometry { .. } => {
                ErrorKind::NumericalDegeneracy
            }
            Self::NoConsensus { .. } => ErrorKind::StatisticalFailure,
        }
    }

    /// Whether retrying with more (or better spread) bearings could succeed
    pub fn more_measurements_may_help(&self) -> bool {
        matches!(
            self,
            Self::InsufficientMeasurements { .. }
                | Self::DegenerateGeometry { .. }
                | Self::NoConsensus { .. }
        )
    }

    pub(crate) fn invalid(parameter: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidInput {
            parameter,
            value,
            reason,
        }
    }
}

/// Reject anything that is not a strictly positive finite number
pub(crate) fn require_positive(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(LocalizationError::invalid(
            parameter,
            value,
            "must be positive and finite",
        ))
    }
}

pub(crate) fn require_finite(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LocalizationError::invalid(parameter, value, "must be finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = LocalizationError::invalid("wavelength", -1.0, "must be positive and finite");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!err.more_measurements_may_help());

        let err = LocalizationError::DegenerateGeometry {
            condition_number: f64::INFINITY,
            measurement_count: 2,
        };
        assert_eq!(err.kind(), ErrorKind::NumericalDegeneracy);
        assert!(err.more_measurements_may_help());

        let err = LocalizationError::NoConsensus {
            iterations: 100,
            best_inliers: 2,
            required: 3,
        };
        assert_eq!(err.kind(), ErrorKind::StatisticalFailure);
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = LocalizationError::InsufficientMeasurements {
            available: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient measurements: 1 available, 2 required"
        );

        let err = LocalizationError::invalid("tx_power", 0.0, "must be positive and finite");
        assert!(err.to_string().contains("tx_power"));
    }

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("sigma", 0.3).unwrap(), 0.3);
        assert!(require_positive("sigma", 0.0).is_err());
        assert!(require_positive("sigma", f64::NAN).is_err());
        assert!(require_positive("sigma", f64::INFINITY).is_err());
        assert!(require_finite("x", -2.0).is_ok());
    }
}
