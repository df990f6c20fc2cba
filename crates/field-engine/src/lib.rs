//! Field Alignment & Verification Engine
//!
//! This crate makes forecast fields from heterogeneous sources pointwise
//! comparable. Sources may differ in grid layout (regular lat/lon or
//! irregular mesh), lead-time spacing and ensemble size. It provides:
//!
//! - **Grid model**: one lookup interface over regular and irregular grids,
//!   with a spatial index built once per irregular grid
//! - **Time resolution**: lead offsets matched on each source's own axis,
//!   sources aligned on computed valid time
//! - **Ensemble reduction**: member selection, mean and spread
//! - **Alignment**: nearest-neighbour resampling onto a reference grid
//! - **Verification records**: a flat, stably ordered record stream
//!
//! # Architecture
//!
//! ```text
//! ComparisonRequest
//!      │
//!      ▼
//! orchestrator::compare(sources, reference)
//!      │
//!      ├─► time_resolver: offsets ──► valid times (per source axis)
//!      │
//!      ├─► FieldSource::open() ──► FieldReader::read() (request-scoped)
//!      │
//!      ├─► ensemble::reduce (member / mean / spread)
//!      │
//!      ├─► regrid::align onto the reference grid
//!      │         │
//!      │         ├─► identical grid: passthrough
//!      │         │
//!      │         └─► otherwise: GridModel::nearest_point per target point
//!      │
//!      └─► ops: crop, difference, value range
//!               │
//!               ▼
//!          Comparison ──► verification::convert ──► Vec<VerificationRecord>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use field_engine::{compare, ComparisonRequest, EngineConfig};
//!
//! let request = ComparisonRequest {
//!     valid_time: Some(cycle),
//!     lead_times: vec![4, 8],
//!     difference: true,
//!     ..ComparisonRequest::new("air_temperature_2m")
//! };
//! let result = compare(&[&forecast], Some(&analysis), &request, &EngineConfig::default())?;
//!
//! for diff in &result.differences {
//!     // hand to the renderer
//! }
//! ```

pub mod config;
pub mod curves;
pub mod ensemble;
pub mod error;
pub mod grid;
pub mod ops;
pub mod orchestrator;
pub mod regrid;
pub mod source;
pub mod time_resolver;
pub mod types;
pub mod verification;

// Re-export commonly used types at crate root
pub use config::{EngineConfig, DEFAULT_COORD_TOLERANCE};
pub use curves::{align_curves, moving_average, summarize, AlignedCurves, CurveSummary, LossCurve};
pub use ensemble::{reduce, EnsembleArray, EnsembleDescriptor, ReduceMode};
pub use error::{FieldError, Result};
pub use grid::{CoordinateUnits, Grid, GridDescriptor, GridModel, PointLookup, SpatialIndex};
pub use ops::{crop, difference, value_range};
pub use orchestrator::{compare, verify, Comparison, ComparisonRequest};
pub use regrid::{align, NearestMapping};
pub use source::{FieldReader, FieldSource, InMemorySource, SourceSpec};
pub use time_resolver::{resolve, resolve_at_cycle, resolve_valid_times, ResolvedIndices, ResolvedStep, TimeAxis};
pub use types::{is_missing, FieldSlice, SliceMeta, SliceSummary, MISSING};
pub use verification::{convert, expected_record_count, VerificationRecord};
