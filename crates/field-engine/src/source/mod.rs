//! Contract between the engine and the I/O collaborator that owns forecast data.
//!
//! A [`FieldSource`] is a caller-owned handle describing one dataset: its grid,
//! time axis and ensemble layout. Value arrays are read through a
//! [`FieldReader`] opened per comparison request; the reader is dropped when
//! the request returns, on success and on failure alike.

mod memory;

pub use memory::{InMemorySource, SourceSpec};

use std::sync::Arc;

use crate::ensemble::EnsembleDescriptor;
use crate::error::Result;
use crate::grid::Grid;
use crate::time_resolver::TimeAxis;

/// Descriptive handle for one forecast or reference dataset.
pub trait FieldSource: Send + Sync {
    /// Identifier used in slices, records and log output.
    fn name(&self) -> &str;

    /// Spatial layout of every value array in this source.
    fn grid(&self) -> &Arc<Grid>;

    /// Cycles and lead offsets available in this source.
    fn time_axis(&self) -> &TimeAxis;

    fn ensemble(&self) -> EnsembleDescriptor;

    /// Whether `variable` can be read from this source.
    fn has_variable(&self, variable: &str) -> bool;

    /// Open a reader scoped to one request.
    fn open(&self) -> Result<Box<dyn FieldReader + '_>>;
}

/// Value-array accessor valid for the lifetime of one request.
pub trait FieldReader {
    /// Read one flat per-grid-point array.
    ///
    /// # Arguments
    /// * `variable` - Variable name as known to the source
    /// * `cycle_index` - Index into the time axis's cycles
    /// * `lead_index` - Index into the time axis's lead offsets
    /// * `member` - Ensemble member index
    ///
    /// # Returns
    /// One value per grid point in storage order, missing values as NaN.
    fn read(
        &mut self,
        variable: &str,
        cycle_index: usize,
        lead_index: usize,
        member: usize,
    ) -> Result<Vec<f32>>;
}
