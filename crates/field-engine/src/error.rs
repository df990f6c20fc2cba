//! Error types for field alignment and verification.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while aligning or verifying forecast fields.
///
/// All variants are local to a single request. None of them is transient, so
/// callers report them rather than retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// A requested lead-time offset is absent from the source's axis.
    #[error("lead time {requested} not found (available offsets: {available:?})")]
    LeadTimeNotFound { requested: u32, available: Vec<u32> },

    /// A requested cycle or valid time is not covered by the source.
    #[error("time {requested} not covered by source (available {first} .. {last})")]
    ValidTimeNotFound {
        requested: DateTime<Utc>,
        first: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    /// A point lookup fell outside the source grid's domain.
    #[error("point (lat {lat}, lon {lon}) is outside the grid domain")]
    OutOfDomain { lat: f64, lon: f64 },

    /// Too many target points fell outside the source domain during alignment.
    #[error("{missing} of {total} target points outside source domain (max fraction {max_fraction})")]
    CoverageBelowThreshold {
        missing: usize,
        total: usize,
        max_fraction: f64,
    },

    /// Mean/spread requested on a source with too few members.
    #[error("ensemble reduction needs at least {required} members, source has {available}")]
    InsufficientMembers { required: usize, available: usize },

    /// A selected member does not exist.
    #[error("member index {index} out of range (member count {member_count})")]
    MemberIndexOutOfRange { index: usize, member_count: usize },

    /// Two fields were combined without being aligned onto the same grid.
    #[error("grid mismatch: {left} vs {right}")]
    GridMismatch { left: String, right: String },

    /// Two fields were combined whose lead times refer to different valid times.
    #[error("valid time mismatch: {left} vs {right}")]
    ValidTimeMismatch {
        left: DateTime<Utc>,
        right: DateTime<Utc>,
    },

    /// Cross-source time matching was attempted without a requested valid time.
    #[error("no valid time was requested; only lead-time comparison is possible")]
    TimeNotAnchored,

    /// A value array does not match its declared shape.
    #[error("shape mismatch in {context}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// Grid description is structurally invalid.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Time axis description is structurally invalid.
    #[error("invalid time axis: {0}")]
    InvalidTimeAxis(String),

    /// Variable is not provided by the source.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Failure reported by a source's value-array accessor.
    #[error("source error: {0}")]
    Source(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FieldError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    /// Create an InvalidGrid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Create an InvalidTimeAxis error.
    pub fn invalid_time_axis(msg: impl Into<String>) -> Self {
        Self::InvalidTimeAxis(msg.into())
    }

    /// Create a Source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Whether the error reflects a broken source rather than a bad request.
    pub fn is_fatal_for_source(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::InvalidGrid(_) | Self::InvalidTimeAxis(_) | Self::Source(_)
        )
    }
}

/// Result type for field engine operations.
pub type Result<T> = std::result::Result<T, FieldError>;
