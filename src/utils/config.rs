use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::algorithms::consensus::ConsensusConfig;
use crate::algorithms::propagation::wavelength_from_frequency;
use crate::algorithms::switched_array::SwitchedArray;
use crate::algorithms::triangulation::{TriangulationConfig, Triangulator};
use crate::core::HALF_POWER_CONSTANT;
use crate::processing::scenario::{Scenario, ScenarioConfig, SensorPairConfig};

/// Radio propagation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Carrier frequency (Hz)
    pub frequency_hz: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self { frequency_hz: 2.4e9 }
    }
}

/// Switched circular array settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayConfig {
    pub element_count: usize,
    /// Array radius (m)
    pub radius_m: f64,
    /// Signal-to-noise ratio used by simulated sweeps (dB)
    pub snr_db: f64,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            element_count: 8,
            radius_m: 1.0,
            snr_db: 20.0,
        }
    }
}

/// Complete locator configuration, one section per component
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocatorConfig {
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub sensor_pair: SensorPairConfig,
    #[serde(default)]
    pub switched_array: ArrayConfig,
    #[serde(default)]
    pub triangulation: TriangulationConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid parameter {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Configuration I/O error: {message}")]
    IoError { message: String },

    #[error("Configuration serialization error: {message}")]
    SerializationError { message: String },
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<ConfigError>,
    /// Validation warnings
    pub warnings: Vec<String>,
    /// Suggested corrections
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    fn reject(&mut self, parameter: &str, value: impl ToString, reason: &str) {
        self.errors.push(ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Main configuration manager
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    config: LocatorConfig,
    /// Configuration file path
    config_file_path: Option<String>,
    /// Whether configuration has been modified
    is_modified: bool,
}

impl ConfigurationManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn config_file_path(&self) -> Option<&str> {
        self.config_file_path.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Replace the whole configuration after validating it
    pub fn update_config(&mut self, config: LocatorConfig) -> Result<(), ConfigError> {
        Self::ensure_valid(&config)?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from a JSON file; missing sections take their defaults
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: LocatorConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        // Validate before applying
        Self::ensure_valid(&config)?;

        info!(path = %path_str, "configuration loaded");
        self.config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.config).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            }
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })?;

        debug!(path = %path_str, "configuration saved");
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file the configuration was last loaded from or saved to
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::IoError {
                message: "No configuration file path set".to_string(),
            }),
        }
    }

    /// Change the carrier frequency, returning the previous value
    pub fn set_frequency(&mut self, frequency_hz: f64) -> Result<f64, ConfigError> {
        if !(frequency_hz > 0.0 && frequency_hz.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                parameter: "frequency_hz".to_string(),
                value: frequency_hz.to_string(),
                reason: "Frequency must be positive and finite".to_string(),
            });
        }
        let old = self.config.propagation.frequency_hz;
        self.config.propagation.frequency_hz = frequency_hz;
        self.is_modified = true;
        Ok(old)
    }

    /// Change the consensus inlier threshold, returning the previous value
    pub fn set_inlier_threshold(&mut self, threshold_m: f64) -> Result<f64, ConfigError> {
        if !(threshold_m > 0.0 && threshold_m.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                parameter: "consensus.inlier_threshold_m".to_string(),
                value: threshold_m.to_string(),
                reason: "Inlier threshold must be positive".to_string(),
            });
        }
        let old = self.config.consensus.inlier_threshold_m;
        self.config.consensus.inlier_threshold_m = threshold_m;
        self.is_modified = true;
        Ok(old)
    }

    /// Carrier wavelength (m)
    pub fn wavelength(&self) -> crate::Result<f64> {
        wavelength_from_frequency(self.config.propagation.frequency_hz)
    }

    pub fn triangulator(&self) -> Triangulator {
        Triangulator::new(self.config.triangulation.clone(), self.config.consensus.clone())
    }

    pub fn switched_array(&self) -> crate::Result<SwitchedArray> {
        SwitchedArray::new(
            self.config.switched_array.element_count,
            self.config.switched_array.radius_m,
        )
    }

    pub fn scenario(&self) -> crate::Result<Scenario> {
        Scenario::new(self.config.scenario.clone(), self.config.sensor_pair.clone())
    }

    /// Validate a configuration, collecting every problem
    pub fn validate(config: &LocatorConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        let f = config.propagation.frequency_hz;
        if !(f > 0.0 && f.is_finite()) {
            result.reject("propagation.frequency_hz", f, "Frequency must be positive and finite");
        } else if !(1e6..=1e11).contains(&f) {
            result.warnings.push(format!(
                "Carrier frequency {} Hz is outside the usual 1 MHz - 100 GHz RF range",
                f
            ));
        }

        let pair = &config.sensor_pair;
        if !(pair.beamwidth_std > 0.0 && pair.beamwidth_std.is_finite()) {
            result.reject(
                "sensor_pair.beamwidth_std",
                pair.beamwidth_std,
                "Beamwidth must be positive",
            );
        } else if pair.beamwidth_std > (1.0 / HALF_POWER_CONSTANT).sqrt() {
            result.reject(
                "sensor_pair.beamwidth_std",
                pair.beamwidth_std,
                "Pattern never falls to half power at this beamwidth",
            );
        }
        if !(pair.squint_rad > 0.0 && pair.squint_rad < std::f64::consts::PI) {
            result.reject("sensor_pair.squint_rad", pair.squint_rad, "Squint must lie in (0, π)");
        }
        if !(pair.separation_m > 0.0 && pair.separation_m.is_finite()) {
            result.reject(
                "sensor_pair.separation_m",
                pair.separation_m,
                "Element separation must be positive",
            );
        }

        let array = &config.switched_array;
        if array.element_count < 3 {
            result.reject(
                "switched_array.element_count",
                array.element_count,
                "A circular array needs at least 3 elements",
            );
        }
        if !(array.radius_m > 0.0 && array.radius_m.is_finite()) {
            result.reject(
                "switched_array.radius_m",
                array.radius_m,
                "Array radius must be positive",
            );
        }
        if !array.snr_db.is_finite() {
            result.reject("switched_array.snr_db", array.snr_db, "SNR must be finite");
        } else if array.snr_db < 0.0 {
            result
                .warnings
                .push("Negative SNR: noise dominates the element powers".to_string());
        }

        if !(config.triangulation.max_condition_number > 1.0) {
            result.reject(
                "triangulation.max_condition_number",
                config.triangulation.max_condition_number,
                "Condition number limit must exceed 1",
            );
        }

        let consensus = &config.consensus;
        if !(consensus.inlier_threshold_m > 0.0 && consensus.inlier_threshold_m.is_finite()) {
            result.reject(
                "consensus.inlier_threshold_m",
                consensus.inlier_threshold_m,
                "Inlier threshold must be positive",
            );
        }
        if consensus.max_iterations == 0 {
            result.reject("consensus.max_iterations", 0, "At least one iteration is required");
        } else if consensus.max_iterations < 20 {
            result.warnings.push(format!(
                "Only {} consensus iterations; outliers may survive",
                consensus.max_iterations
            ));
        }
        if consensus.min_inliers < 2 {
            result.reject(
                "consensus.min_inliers",
                consensus.min_inliers,
                "A position needs at least 2 agreeing bearings",
            );
        }

        let scenario = &config.scenario;
        if !(scenario.area_max_m > scenario.area_min_m) {
            result.reject("scenario.area_max_m", scenario.area_max_m, "Must exceed area_min_m");
        } else if !(scenario.area_max_m - scenario.area_min_m).is_finite() {
            result.reject(
                "scenario.area_max_m",
                scenario.area_max_m,
                "Placement area must be finite",
            );
        }
        if !(scenario.emitter_power > 0.0 && scenario.emitter_power.is_finite()) {
            result.reject(
                "scenario.emitter_power",
                scenario.emitter_power,
                "Transmit power must be positive",
            );
        }
        if !(scenario.power_noise_db >= 0.0 && scenario.power_noise_db.is_finite()) {
            result.reject(
                "scenario.power_noise_db",
                scenario.power_noise_db,
                "Noise level must be non-negative",
            );
        }
        if scenario.pair_count < consensus.min_inliers.max(3) {
            result.warnings.push(format!(
                "{} sensor pairs cannot satisfy a robust fit requiring {}",
                scenario.pair_count,
                consensus.required_measurements()
            ));
            result
                .suggestions
                .push("Increase scenario.pair_count or lower consensus.min_inliers".to_string());
        }
        let [ex, ey, _] = scenario.emitter_position;
        let inside = |v: f64| (scenario.area_min_m..=scenario.area_max_m).contains(&v);
        if !(inside(ex) && inside(ey)) {
            result
                .warnings
                .push("Emitter lies outside the sensor placement area".to_string());
            result
                .suggestions
                .push("Widen the placement area so pairs surround the emitter".to_string());
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    fn ensure_valid(config: &LocatorConfig) -> Result<(), ConfigError> {
        let validation = Self::validate(config);
        match validation.errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rdf_geolocation_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigurationManager::validate(&LocatorConfig::default());
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_configuration_manager_creation() {
        let manager = ConfigurationManager::new();
        assert_eq!(manager.config().propagation.frequency_hz, 2.4e9);
        assert_eq!(manager.config().consensus.min_inliers, 3);
        assert!(!manager.is_modified());
        assert!((manager.wavelength().unwrap() - 0.124913524).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = LocatorConfig::default();
        config.propagation.frequency_hz = -1.0;
        config.sensor_pair.beamwidth_std = 2.0;
        config.switched_array.element_count = 2;
        config.consensus.inlier_threshold_m = 0.0;

        let result = ConfigurationManager::validate(&config);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 4);

        let mut manager = ConfigurationManager::new();
        assert!(manager.update_config(config).is_err());
        assert!(!manager.is_modified());
    }

    #[test]
    fn test_unbounded_area_is_rejected() {
        let mut config = LocatorConfig::default();
        config.scenario.area_min_m = -1e308;
        config.scenario.area_max_m = 1e308;

        let result = ConfigurationManager::validate(&config);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut config = LocatorConfig::default();
        config.scenario.pair_count = 2;
        config.scenario.emitter_position = [900.0, 120.0, 250.0];

        let result = ConfigurationManager::validate(&config);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.suggestions.len(), 2);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let path = temp_path("roundtrip");
        let mut manager = ConfigurationManager::new();
        manager.set_frequency(915e6).unwrap();
        manager.set_inlier_threshold(2.5).unwrap();
        assert!(manager.is_modified());

        manager.save_to_file(&path).unwrap();
        assert!(!manager.is_modified());

        let loaded = ConfigurationManager::from_file(&path).unwrap();
        let config = loaded.config();
        assert_eq!(config.propagation.frequency_hz, 915e6);
        assert_eq!(config.consensus.inlier_threshold_m, 2.5);
        assert_eq!(config.scenario.pair_count, 10);
        assert_eq!(config.scenario.response, manager.config().scenario.response);
        assert!((config.sensor_pair.squint_rad - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert_eq!(loaded.config_file_path(), Some(&*path.to_string_lossy()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_path("partial");
        let partial = r#"{
            "consensus": { "inlier_threshold_m": 1.5, "max_iterations": 50, "min_inliers": 4 }
        }"#;
        fs::write(&path, partial).unwrap();

        let manager = ConfigurationManager::from_file(&path).unwrap();
        assert_eq!(manager.config().consensus.inlier_threshold_m, 1.5);
        assert_eq!(manager.config().consensus.seed, None);
        assert_eq!(manager.config().scenario, ScenarioConfig::default());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_bad_files() {
        let path = temp_path("invalid");
        let one_element = r#"{
            "switched_array": { "element_count": 1, "radius_m": 1.0, "snr_db": 10.0 }
        }"#;
        fs::write(&path, one_element).unwrap();
        assert!(matches!(
            ConfigurationManager::from_file(&path),
            Err(ConfigError::InvalidParameter { .. })
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ConfigurationManager::from_file(&path),
            Err(ConfigError::SerializationError { .. })
        ));
        let _ = fs::remove_file(&path);

        assert!(matches!(
            ConfigurationManager::from_file(temp_path("missing")),
            Err(ConfigError::IoError { .. })
        ));
    }

    #[test]
    fn test_setters_reject_invalid_values() {
        let mut manager = ConfigurationManager::new();
        assert!(manager.set_frequency(0.0).is_err());
        assert!(manager.set_inlier_threshold(f64::NAN).is_err());
        assert_eq!(manager.set_frequency(5.8e9).unwrap(), 2.4e9);
        assert!(manager.save().is_err());
    }

    #[test]
    fn test_components_from_config() {
        let manager = ConfigurationManager::new();
        assert_eq!(manager.switched_array().unwrap().element_count(), 8);
        assert_eq!(manager.scenario().unwrap().config().pair_count, 10);
        assert_eq!(manager.triangulator().consensus_config().inlier_threshold_m, 5.0);
    }
}
