//! Configuration for the alignment engine.

use serde::{Deserialize, Serialize};

/// Default tolerance (degrees) for coordinate comparisons.
pub const DEFAULT_COORD_TOLERANCE: f64 = 1e-6;

/// Configuration for alignment and verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest fraction of target points allowed outside the source domain
    /// before alignment fails. `1.0` never fails, `0.0` is strict.
    pub max_missing_fraction: f64,

    /// Tolerance in degrees for grid equality and domain tests.
    pub coord_tolerance: f64,

    /// Return the nearest point for lookups outside an irregular grid's hull.
    pub nearest_fallback: bool,

    /// Convert known variables to display units when reading.
    pub convert_units: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_missing_fraction: 1.0,
            coord_tolerance: DEFAULT_COORD_TOLERANCE,
            nearest_fallback: false,
            convert_units: true,
        }
    }
}

impl EngineConfig {
    /// Strict alignment: any target point outside the source domain fails.
    pub fn strict() -> Self {
        Self {
            max_missing_fraction: 0.0,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FIELD_MAX_MISSING_FRACTION") {
            if let Ok(fraction) = val.parse() {
                config.max_missing_fraction = fraction;
            }
        }

        if let Ok(val) = std::env::var("FIELD_COORD_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.coord_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("FIELD_NEAREST_FALLBACK") {
            config.nearest_fallback = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("FIELD_CONVERT_UNITS") {
            config.convert_units = parse_flag(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.max_missing_fraction) {
            return Err("max_missing_fraction must be within 0.0-1.0".to_string());
        }

        if !self.coord_tolerance.is_finite() || self.coord_tolerance < 0.0 {
            return Err("coord_tolerance must be a non-negative number".to_string());
        }

        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}
