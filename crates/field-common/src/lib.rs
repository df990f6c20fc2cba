//! Common types and utilities shared across the field comparison crates.

pub mod bbox;
pub mod time;
pub mod variable;

pub use bbox::{BboxParseError, BoundingBox};
pub use time::{lead_label, parse_step, ForecastTime, TimeParseError};
pub use variable::{lookup_variable, VariableInfo, VARIABLES};
