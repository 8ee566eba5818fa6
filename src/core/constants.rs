//! Physical constants and estimator parameters

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Floor applied to transmitter/receiver distances (m)
pub const MIN_DISTANCE_M: f64 = 1e-6;

/// `-ln(0.5)`, the exponent scale at which a Gaussian beam falls to half power
pub const HALF_POWER_CONSTANT: f64 = std::f64::consts::LN_2;

/// Decibel scale of the linearized bearing formula (close to 20·log10(2))
pub const DB_SQUINT_CONSTANT: f64 = 6.0202;

/// Added to the power sum when scoring switched-array confidence
pub const CONFIDENCE_EPSILON: f64 = 1e-6;

/// Chi-square value for a 95% two-dimensional confidence region
pub const CHI2_2DOF_95: f64 = 5.991;

/// CEP ≈ 0.5887 (σx + σy) for a near-circular error distribution
pub const CEP_FACTOR: f64 = 0.5887;
