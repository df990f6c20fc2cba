//! Comparison orchestration.
//!
//! Answers "variable V at time T for lead times L from sources S, optionally
//! differenced against reference R". Every call is self-contained: it opens
//! one reader per source, builds fresh slices, and keeps nothing afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use field_common::{lookup_variable, BoundingBox};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::config::EngineConfig;
use crate::ensemble::{reduce, EnsembleArray, ReduceMode};
use crate::error::{FieldError, Result};
use crate::grid::{Grid, GridModel};
use crate::ops;
use crate::regrid::align;
use crate::source::FieldSource;
use crate::time_resolver::{resolve, resolve_at_cycle, resolve_valid_times, ResolvedIndices};
use crate::types::{FieldSlice, SliceMeta};
use crate::verification::{convert, VerificationRecord};

/// Parameters of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub variable: String,

    /// Forecast cycle start. Without it the primary source's first cycle is
    /// used and sources are compared by lead offset only.
    #[serde(default)]
    pub valid_time: Option<DateTime<Utc>>,

    /// Lead offsets on the primary source's axis; empty selects all.
    #[serde(default)]
    pub lead_times: Vec<u32>,

    /// Member selections for forecast sources; empty selects every member.
    #[serde(default)]
    pub members: Vec<ReduceMode>,

    #[serde(default)]
    pub bbox: Option<BoundingBox>,

    /// Also compute forecast minus reference.
    #[serde(default)]
    pub difference: bool,

    /// Common regular grid spacing in degrees for comparisons without a
    /// reference. Ignored when a reference is given.
    #[serde(default)]
    pub resolution: Option<f64>,
}

impl ComparisonRequest {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            valid_time: None,
            lead_times: Vec::new(),
            members: Vec::new(),
            bbox: None,
            difference: false,
            resolution: None,
        }
    }
}

/// Slices produced by one comparison, ready for rendering or export.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// One slice per forecast source, in request order.
    pub forecasts: Vec<FieldSlice>,
    pub reference: Option<FieldSlice>,
    /// `forecast - reference`, one per forecast, when requested.
    pub differences: Vec<FieldSlice>,
    /// Shared range over forecasts and reference.
    pub value_range: Option<(f32, f32)>,
    pub difference_range: Option<(f32, f32)>,
}

impl Comparison {
    /// Forecast slices followed by the reference slice.
    pub fn fields(&self) -> Vec<FieldSlice> {
        self.forecasts
            .iter()
            .chain(self.reference.iter())
            .cloned()
            .collect()
    }
}

/// Run a comparison.
///
/// The first source is the primary: the request's lead offsets are resolved
/// on its axis. Other forecast sources are resolved to the primary's valid
/// times from the same cycle, and the reference to the same valid times from
/// any of its cycles. Without a requested time every source falls back to
/// the same lead offsets.
///
/// When a reference is given every forecast is aligned onto its grid.
/// Without one, a requested `resolution` aligns every forecast onto a
/// regular grid of that spacing covering the primary source's domain.
pub fn compare(
    sources: &[&dyn FieldSource],
    reference: Option<&dyn FieldSource>,
    request: &ComparisonRequest,
    config: &EngineConfig,
) -> Result<Comparison> {
    config.validate().map_err(FieldError::Config)?;
    let primary = *sources
        .first()
        .ok_or_else(|| FieldError::Config("no forecast source given".to_string()))?;
    if request.difference && reference.is_none() {
        return Err(FieldError::Config(
            "difference requested without a reference source".to_string(),
        ));
    }

    let _span = info_span!(
        "compare",
        variable = %request.variable,
        primary = primary.name(),
        sources = sources.len()
    )
    .entered();

    let primary_steps = resolve(request.valid_time, &request.lead_times, primary.time_axis())?;
    if !primary_steps.anchored && (sources.len() > 1 || reference.is_some()) {
        warn!("No valid time requested, sources are compared by lead offset only");
    }

    let selections = member_selections(&request.members);
    let mut forecasts = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        let steps = if i == 0 {
            primary_steps.clone()
        } else {
            match request.valid_time {
                Some(cycle) => resolve_at_cycle(cycle, &primary_steps.valid_times(), source.time_axis())?,
                None => resolve(None, &primary_steps.leads(), source.time_axis())?,
            }
        };
        let members = match &selections {
            Some(modes) => modes.clone(),
            None => (0..source.ensemble().member_count())
                .map(ReduceMode::Member)
                .collect(),
        };
        forecasts.push(read_slice(*source, &request.variable, steps, &members, config)?);
    }

    let reference_slice = match reference {
        Some(source) => {
            let steps = match request.valid_time {
                Some(_) => resolve_valid_times(&primary_steps.valid_times(), source.time_axis())?,
                None => resolve(None, &primary_steps.leads(), source.time_axis())?,
            };
            let mode = if source.ensemble().is_deterministic() {
                ReduceMode::Member(0)
            } else {
                ReduceMode::Mean
            };
            Some(read_slice(source, &request.variable, steps, &[mode], config)?)
        }
        None => None,
    };

    let target = match (&reference_slice, request.resolution) {
        (Some(reference), resolution) => {
            if resolution.is_some() {
                warn!("Resolution ignored, forecasts are aligned onto the reference grid");
            }
            Some(reference.grid().clone())
        }
        (None, Some(resolution)) => Some(common_grid(&forecasts[0], resolution, config)?),
        (None, None) => None,
    };
    if let Some(target) = target {
        forecasts = forecasts
            .iter()
            .map(|f| align(f, &target, config))
            .collect::<Result<Vec<_>>>()?;
    }

    let (forecasts, reference_slice) = match &request.bbox {
        Some(bbox) => (
            forecasts
                .iter()
                .map(|f| ops::crop(f, bbox))
                .collect::<Result<Vec<_>>>()?,
            reference_slice.map(|r| ops::crop(&r, bbox)).transpose()?,
        ),
        None => (forecasts, reference_slice),
    };

    let differences = match (&reference_slice, request.difference) {
        (Some(reference), true) => forecasts
            .iter()
            .map(|f| ops::difference(f, reference, config.coord_tolerance))
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };

    let mut comparison = Comparison {
        forecasts,
        reference: reference_slice,
        differences,
        value_range: None,
        difference_range: None,
    };
    comparison.value_range = ops::value_range(&comparison.fields());
    comparison.difference_range = ops::value_range(&comparison.differences);

    info!(
        forecasts = comparison.forecasts.len(),
        reference = comparison.reference.is_some(),
        differences = comparison.differences.len(),
        leads = primary_steps.len(),
        "Comparison complete"
    );
    Ok(comparison)
}

/// Run a comparison and flatten forecasts and reference into records.
pub fn verify(
    sources: &[&dyn FieldSource],
    reference: Option<&dyn FieldSource>,
    request: &ComparisonRequest,
    config: &EngineConfig,
) -> Result<Vec<VerificationRecord>> {
    let comparison = compare(sources, reference, request, config)?;
    Ok(convert(&comparison.fields()))
}

/// Sorted, deduplicated selections, or `None` for "every member".
fn member_selections(requested: &[ReduceMode]) -> Option<Vec<ReduceMode>> {
    if requested.is_empty() {
        return None;
    }
    let mut modes = requested.to_vec();
    modes.sort();
    modes.dedup();
    Some(modes)
}

/// Regular grid at `resolution` degrees over the primary slice's domain.
fn common_grid(primary: &FieldSlice, resolution: f64, config: &EngineConfig) -> Result<Arc<Grid>> {
    let bbox = primary
        .grid()
        .descriptor()
        .bbox()
        .ok_or_else(|| FieldError::invalid_grid("primary grid has no extent"))?;
    let grid = Grid::regular_covering(&bbox, resolution, config.coord_tolerance)?;
    info!(
        source = primary.source(),
        resolution,
        grid = %grid.descriptor(),
        "Aligning forecasts onto common grid"
    );
    Ok(Arc::new(grid))
}

/// Read, convert and reduce one source into a slice on its own grid.
fn read_slice(
    source: &dyn FieldSource,
    variable: &str,
    resolved: ResolvedIndices,
    selections: &[ReduceMode],
    config: &EngineConfig,
) -> Result<FieldSlice> {
    if !source.has_variable(variable) {
        return Err(FieldError::UnknownVariable(format!(
            "{} (source {})",
            variable,
            source.name()
        )));
    }

    let points = source.grid().point_count();
    let member_count = source.ensemble().member_count();
    let mut data = Vec::with_capacity(resolved.len() * member_count * points);
    {
        let mut reader = source.open()?;
        for step in &resolved.steps {
            for member in 0..member_count {
                let values = reader.read(variable, step.cycle_index, step.lead_index, member)?;
                if values.len() != points {
                    return Err(FieldError::shape_mismatch(
                        points,
                        values.len(),
                        format!("{} {} lead {} member {}", source.name(), variable, step.lead, member),
                    ));
                }
                data.extend(values);
            }
        }
    }

    let units = match lookup_variable(variable) {
        Some(info) if config.convert_units => {
            info.convert_in_place(&mut data);
            Some(info.units.to_string())
        }
        Some(info) => Some(info.source_units.to_string()),
        None => None,
    };

    let array = EnsembleArray::new(resolved.len(), member_count, points, data)?;
    let reduced = selections
        .iter()
        .map(|mode| reduce(&array, *mode))
        .collect::<Result<Vec<_>>>()?;

    let mut values = Vec::with_capacity(resolved.len() * selections.len() * points);
    for step in 0..resolved.len() {
        for r in &reduced {
            values.extend_from_slice(r.member_values(step, 0));
        }
    }

    debug!(
        source = source.name(),
        steps = resolved.len(),
        members = ?selections,
        "Read field slice"
    );

    let time = resolved
        .steps
        .first()
        .map(|s| s.cycle)
        .unwrap_or_else(|| source.time_axis().cycles()[0]);
    FieldSlice::new(
        SliceMeta {
            source: source.name().to_string(),
            variable: variable.to_string(),
            units,
            time,
            anchored: resolved.anchored,
            steps: resolved.steps,
            members: selections.to_vec(),
        },
        source.grid().clone(),
        values,
    )
}
