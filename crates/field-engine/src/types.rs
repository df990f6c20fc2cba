//! The engine's working unit: one variable on one grid for a set of resolved
//! lead times and member selections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ensemble::ReduceMode;
use crate::error::{FieldError, Result};
use crate::grid::{Grid, GridModel};
use crate::time_resolver::ResolvedStep;

/// Marker for a missing value inside a field.
pub const MISSING: f32 = f32::NAN;

/// Whether a field value is the missing marker.
pub fn is_missing(value: f32) -> bool {
    value.is_nan()
}

/// A resolved, immutable field. Values are laid out `[step][member][point]`.
#[derive(Debug, Clone)]
pub struct FieldSlice {
    source: String,
    variable: String,
    units: Option<String>,
    grid: Arc<Grid>,
    time: DateTime<Utc>,
    anchored: bool,
    steps: Vec<ResolvedStep>,
    members: Vec<ReduceMode>,
    values: Vec<f32>,
}

/// Everything but the values, for building derived slices.
#[derive(Debug, Clone)]
pub struct SliceMeta {
    pub source: String,
    pub variable: String,
    pub units: Option<String>,
    /// Requested cycle, or the primary source's first cycle when unanchored.
    pub time: DateTime<Utc>,
    pub anchored: bool,
    pub steps: Vec<ResolvedStep>,
    pub members: Vec<ReduceMode>,
}

impl FieldSlice {
    /// Create a slice, checking that `values` matches steps x members x grid points.
    pub fn new(meta: SliceMeta, grid: Arc<Grid>, values: Vec<f32>) -> Result<Self> {
        let expected = meta.steps.len() * meta.members.len() * grid.point_count();
        if values.len() != expected {
            return Err(FieldError::shape_mismatch(
                expected,
                values.len(),
                format!("field slice {}/{}", meta.source, meta.variable),
            ));
        }
        Ok(Self {
            source: meta.source,
            variable: meta.variable,
            units: meta.units,
            grid,
            time: meta.time,
            anchored: meta.anchored,
            steps: meta.steps,
            members: meta.members,
            values,
        })
    }

    pub fn meta(&self) -> SliceMeta {
        SliceMeta {
            source: self.source.clone(),
            variable: self.variable.clone(),
            units: self.units.clone(),
            time: self.time,
            anchored: self.anchored,
            steps: self.steps.clone(),
            members: self.members.clone(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn steps(&self) -> &[ResolvedStep] {
        &self.steps
    }

    pub fn members(&self) -> &[ReduceMode] {
        &self.members
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn point_count(&self) -> usize {
        self.grid.point_count()
    }

    /// Number of values: steps x members x points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values of one (step, member) pair in grid storage order.
    pub fn layer(&self, step: usize, member: usize) -> &[f32] {
        let points = self.point_count();
        let start = (step * self.members.len() + member) * points;
        &self.values[start..start + points]
    }

    /// Number of missing values.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| is_missing(**v)).count()
    }

    pub(crate) fn into_parts(self) -> (SliceMeta, Arc<Grid>, Vec<f32>) {
        let meta = SliceMeta {
            source: self.source,
            variable: self.variable,
            units: self.units,
            time: self.time,
            anchored: self.anchored,
            steps: self.steps,
            members: self.members,
        };
        (meta, self.grid, self.values)
    }
}

/// Descriptive summary of a slice for renderers and logs.
#[derive(Debug, Clone, Serialize)]
pub struct SliceSummary {
    pub source: String,
    pub variable: String,
    pub units: Option<String>,
    pub time: DateTime<Utc>,
    pub anchored: bool,
    pub grid: String,
    pub lead_labels: Vec<String>,
    pub valid_times: Vec<DateTime<Utc>>,
    pub members: Vec<String>,
    pub values: usize,
    pub missing: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl From<&FieldSlice> for SliceSummary {
    fn from(slice: &FieldSlice) -> Self {
        let range = crate::ops::value_range(std::slice::from_ref(slice));
        Self {
            source: slice.source.clone(),
            variable: slice.variable.clone(),
            units: slice.units.clone(),
            time: slice.time,
            anchored: slice.anchored,
            grid: slice.grid.descriptor().to_string(),
            lead_labels: slice.steps.iter().map(|s| s.label()).collect(),
            valid_times: slice.steps.iter().map(|s| s.valid_time).collect(),
            members: slice.members.iter().map(|m| m.to_string()).collect(),
            values: slice.len(),
            missing: slice.missing_count(),
            min: range.map(|r| r.0),
            max: range.map(|r| r.1),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::time_resolver::{resolve, TimeAxis};
    use chrono::TimeZone;

    pub fn cycle() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 15, 0, 0, 0).unwrap()
    }

    /// Deterministic slice with the given leads and members on `grid`.
    pub fn slice(
        source: &str,
        grid: Arc<Grid>,
        leads: &[u32],
        members: Vec<ReduceMode>,
        values: Vec<f32>,
    ) -> FieldSlice {
        let axis = TimeAxis::six_hourly(vec![cycle()], (0..=8).collect()).unwrap();
        let resolved = resolve(Some(cycle()), leads, &axis).unwrap();
        FieldSlice::new(
            SliceMeta {
                source: source.to_string(),
                variable: "air_temperature_2m".to_string(),
                units: Some("°C".to_string()),
                time: cycle(),
                anchored: true,
                steps: resolved.steps,
                members,
            },
            grid,
            values,
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_shape_checked_on_construction() {
        let grid = Arc::new(Grid::regular(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap());
        let good = slice("a", grid.clone(), &[0, 1], vec![ReduceMode::Member(0)], vec![0.0; 8]);
        assert_eq!(good.len(), 8);

        let err = FieldSlice::new(good.meta(), grid, vec![0.0; 7]).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { expected: 8, actual: 7, .. }));
    }

    #[test]
    fn test_layer_indexing() {
        let grid = Arc::new(Grid::irregular(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap());
        let values: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let s = slice(
            "a",
            grid,
            &[0, 1],
            vec![ReduceMode::Member(0), ReduceMode::Member(1)],
            values,
        );
        assert_eq!(s.layer(0, 1), &[2.0, 3.0]);
        assert_eq!(s.layer(1, 0), &[4.0, 5.0]);
    }

    #[test]
    fn test_summary() {
        let grid = Arc::new(Grid::irregular(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap());
        let s = slice("a", grid, &[2], vec![ReduceMode::Mean], vec![MISSING, 4.5]);
        let summary = SliceSummary::from(&s);
        assert_eq!(summary.lead_labels, vec!["+12h".to_string()]);
        assert_eq!(summary.members, vec!["mean".to_string()]);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.min, Some(4.5));
        assert_eq!(summary.grid, "irregular 2 points");
    }
}
