//! Catalog of known forecast variables and their display-unit conversions.

use serde::Serialize;

/// Static description of a forecast variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariableInfo {
    /// Canonical name as written by the forecast model
    pub name: &'static str,
    /// Names the same quantity carries in reanalysis datasets
    pub aliases: &'static [&'static str],
    /// Units of the stored values
    pub source_units: &'static str,
    /// Units shown to users after conversion
    pub units: &'static str,
    /// Multiplier applied before `offset`
    pub scale: f32,
    pub offset: f32,
}

impl VariableInfo {
    /// Convert a stored value to display units. Missing (NaN) stays missing.
    pub fn convert(&self, value: f32) -> f32 {
        value * self.scale + self.offset
    }

    /// Convert a slice of stored values in place.
    pub fn convert_in_place(&self, values: &mut [f32]) {
        if self.scale == 1.0 && self.offset == 0.0 {
            return;
        }
        for v in values.iter_mut() {
            *v = self.convert(*v);
        }
    }

    /// Whether `name` refers to this variable (canonical name or alias).
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| *a == name)
    }
}

pub static VARIABLES: &[VariableInfo] = &[
    VariableInfo {
        name: "air_temperature_2m",
        aliases: &["2t", "t2m"],
        source_units: "K",
        units: "°C",
        scale: 1.0,
        offset: -273.15,
    },
    VariableInfo {
        name: "precipitation_amount_acc6h",
        aliases: &["tp"],
        source_units: "m",
        units: "mm",
        scale: 1000.0,
        offset: 0.0,
    },
    VariableInfo {
        name: "air_pressure_at_sea_level",
        aliases: &["msl"],
        source_units: "Pa",
        units: "hPa",
        scale: 0.01,
        offset: 0.0,
    },
    VariableInfo {
        name: "wind_speed_10m",
        aliases: &["ws10", "10si"],
        source_units: "m/s",
        units: "m/s",
        scale: 1.0,
        offset: 0.0,
    },
];

/// Find a variable by canonical name or alias.
pub fn lookup_variable(name: &str) -> Option<&'static VariableInfo> {
    VARIABLES.iter().find(|v| v.matches(name))
}
