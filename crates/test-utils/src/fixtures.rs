//! Common test fixtures: fixed times, bounding boxes, and sources that
//! misbehave on purpose.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use field_common::BoundingBox;
use field_engine::{
    EnsembleDescriptor, FieldError, FieldReader, FieldSource, Grid, InMemorySource, Result, TimeAxis,
};

/// A fixed forecast cycle for tests (2023-08-15T00:00:00Z).
pub fn base_cycle() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 15, 0, 0, 0).unwrap()
}

/// Common bounding boxes.
pub mod bbox {
    use super::BoundingBox;

    /// Whole globe.
    pub fn global() -> BoundingBox {
        BoundingBox::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// Scandinavia, where the sample meshes live.
    pub fn scandinavia() -> BoundingBox {
        BoundingBox::new(4.0, 54.0, 32.0, 72.0)
    }
}

/// How a [`FailingSource`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// Fail the read with this 0-based sequence number.
    ErrorOnRead(usize),
    /// Return one value too few on every read.
    Truncate,
}

/// Wraps an [`InMemorySource`] and breaks its reads while counting open
/// readers, so tests can check readers are released on error paths.
pub struct FailingSource {
    inner: InMemorySource,
    failure: ReadFailure,
    open: Arc<AtomicUsize>,
}

impl FailingSource {
    pub fn new(inner: InMemorySource, failure: ReadFailure) -> Self {
        Self {
            inner,
            failure,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of readers currently open on this wrapper.
    pub fn open_readers(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl FieldSource for FailingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn grid(&self) -> &Arc<Grid> {
        self.inner.grid()
    }

    fn time_axis(&self) -> &TimeAxis {
        self.inner.time_axis()
    }

    fn ensemble(&self) -> EnsembleDescriptor {
        self.inner.ensemble()
    }

    fn has_variable(&self, variable: &str) -> bool {
        self.inner.has_variable(variable)
    }

    fn open(&self) -> Result<Box<dyn FieldReader + '_>> {
        let inner = self.inner.open()?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FailingReader {
            inner,
            failure: self.failure,
            reads: 0,
            open: self.open.clone(),
        }))
    }
}

struct FailingReader<'a> {
    inner: Box<dyn FieldReader + 'a>,
    failure: ReadFailure,
    reads: usize,
    open: Arc<AtomicUsize>,
}

impl FieldReader for FailingReader<'_> {
    fn read(&mut self, variable: &str, cycle_index: usize, lead_index: usize, member: usize) -> Result<Vec<f32>> {
        let n = self.reads;
        self.reads += 1;
        match self.failure {
            ReadFailure::ErrorOnRead(at) if at == n => Err(FieldError::source(format!("injected failure on read {}", n))),
            ReadFailure::Truncate => {
                let mut values = self.inner.read(variable, cycle_index, lead_index, member)?;
                values.pop();
                Ok(values)
            }
            ReadFailure::ErrorOnRead(_) => self.inner.read(variable, cycle_index, lead_index, member),
        }
    }
}

impl Drop for FailingReader<'_> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
