//! In-memory source backed by flat value arrays.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use field_common::parse_step;
use field_common::time::parse_datetime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FieldReader, FieldSource};
use crate::ensemble::EnsembleDescriptor;
use crate::error::{FieldError, Result};
use crate::grid::{CoordinateUnits, Grid, GridDescriptor, GridModel};
use crate::time_resolver::TimeAxis;
use crate::types::MISSING;

/// Source holding every variable as one array laid out
/// `[cycle][lead][member][point]`.
#[derive(Debug)]
pub struct InMemorySource {
    name: String,
    grid: Arc<Grid>,
    axis: TimeAxis,
    ensemble: EnsembleDescriptor,
    variables: HashMap<String, Vec<f32>>,
    open_readers: Arc<AtomicUsize>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, grid: Arc<Grid>, axis: TimeAxis, ensemble: EnsembleDescriptor) -> Self {
        Self {
            name: name.into(),
            grid,
            axis,
            ensemble,
            variables: HashMap::new(),
            open_readers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a variable, checking its length against the source's dimensions.
    pub fn with_variable(mut self, variable: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        let variable = variable.into();
        let expected = self.layer_count() * self.grid.point_count();
        if values.len() != expected {
            return Err(FieldError::shape_mismatch(
                expected,
                values.len(),
                format!("source {} variable {}", self.name, variable),
            ));
        }
        self.variables.insert(variable, values);
        Ok(self)
    }

    /// Number of readers currently open.
    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    fn layer_count(&self) -> usize {
        self.axis.cycles().len() * self.axis.leads().len() * self.ensemble.member_count()
    }
}

impl FieldSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    fn time_axis(&self) -> &TimeAxis {
        &self.axis
    }

    fn ensemble(&self) -> EnsembleDescriptor {
        self.ensemble
    }

    fn has_variable(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    fn open(&self) -> Result<Box<dyn FieldReader + '_>> {
        let open = self.open_readers.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(source = %self.name, open, "Opened reader");
        Ok(Box::new(MemoryReader { source: self }))
    }
}

struct MemoryReader<'a> {
    source: &'a InMemorySource,
}

impl FieldReader for MemoryReader<'_> {
    fn read(&mut self, variable: &str, cycle_index: usize, lead_index: usize, member: usize) -> Result<Vec<f32>> {
        let source = self.source;
        let values = source
            .variables
            .get(variable)
            .ok_or_else(|| FieldError::UnknownVariable(variable.to_string()))?;

        let leads = source.axis.leads().len();
        let members = source.ensemble.member_count();
        if cycle_index >= source.axis.cycles().len() || lead_index >= leads {
            return Err(FieldError::source(format!(
                "{}: time index ({}, {}) out of range",
                source.name, cycle_index, lead_index
            )));
        }
        if member >= members {
            return Err(FieldError::MemberIndexOutOfRange {
                index: member,
                member_count: members,
            });
        }

        let points = source.grid.point_count();
        let start = ((cycle_index * leads + lead_index) * members + member) * points;
        Ok(values[start..start + points].to_vec())
    }
}

impl Drop for MemoryReader<'_> {
    fn drop(&mut self) {
        let open = self.source.open_readers.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(source = %self.source.name, open, "Released reader");
    }
}

fn default_step() -> String {
    "6h".to_string()
}

fn default_members() -> usize {
    1
}

/// Serializable description of an in-memory source.
///
/// Variable arrays use `null` for missing values and follow the
/// `[cycle][lead][member][point]` layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub grid: GridDescriptor,
    #[serde(default)]
    pub coordinate_units: CoordinateUnits,
    pub cycles: Vec<String>,
    pub leads: Vec<u32>,
    #[serde(default = "default_step")]
    pub step: String,
    #[serde(default = "default_members")]
    pub members: usize,
    #[serde(default)]
    pub variables: HashMap<String, Vec<Option<f32>>>,
}

impl SourceSpec {
    /// Validate the description and build the source.
    pub fn build(&self) -> Result<InMemorySource> {
        let grid = Grid::from_units(self.grid.clone(), self.coordinate_units)?;
        let cycles = self
            .cycles
            .iter()
            .map(|c| parse_datetime(c).map_err(|e| FieldError::invalid_time_axis(format!("{}: {}", self.name, e))))
            .collect::<Result<Vec<_>>>()?;
        let step = parse_step(&self.step).map_err(|e| FieldError::invalid_time_axis(e.to_string()))?;
        let axis = TimeAxis::new(cycles, self.leads.clone(), step)?;
        let ensemble = EnsembleDescriptor::new(self.members)?;

        let mut source = InMemorySource::new(self.name.clone(), Arc::new(grid), axis, ensemble);
        for (variable, values) in &self.variables {
            let values = values.iter().map(|v| v.unwrap_or(MISSING)).collect();
            source = source.with_variable(variable.clone(), values)?;
        }
        Ok(source)
    }
}
