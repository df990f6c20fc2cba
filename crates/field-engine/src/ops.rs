//! Arithmetic on aligned field slices: differencing, value ranges and cropping.

use std::sync::Arc;

use field_common::BoundingBox;
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::types::{is_missing, FieldSlice, SliceMeta, MISSING};

/// Smallest and largest non-missing value across `slices`.
///
/// Returns `None` when every value is missing. Renderers use this as the
/// shared colour-scale range of a comparison.
pub fn value_range(slices: &[FieldSlice]) -> Option<(f32, f32)> {
    slices
        .iter()
        .flat_map(|s| s.values().iter().copied())
        .filter(|v| !is_missing(*v))
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Pointwise `forecast - reference`.
///
/// Both slices must share a grid (the same allocation, or the same layout
/// within `tolerance` degrees); call the aligner first otherwise. Steps are
/// paired by valid time when both slices are time-anchored and by lead offset
/// when they are not. A single-member reference is broadcast across every
/// forecast member; otherwise the member selections must be identical.
/// A missing value on either side yields a missing difference. Mixing an
/// anchored slice with an unanchored one fails with
/// [`FieldError::TimeNotAnchored`].
pub fn difference(forecast: &FieldSlice, reference: &FieldSlice, tolerance: f64) -> Result<FieldSlice> {
    if !Arc::ptr_eq(forecast.grid(), reference.grid())
        && !forecast
            .grid()
            .same_layout(reference.grid(), tolerance)
    {
        return Err(FieldError::GridMismatch {
            left: forecast.grid().descriptor().to_string(),
            right: reference.grid().descriptor().to_string(),
        });
    }

    if forecast.is_anchored() != reference.is_anchored() {
        return Err(FieldError::TimeNotAnchored);
    }
    let by_valid_time = forecast.is_anchored();
    let step_pairs = forecast
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let found = if by_valid_time {
                reference
                    .steps()
                    .iter()
                    .position(|r| r.valid_time == step.valid_time)
            } else {
                reference.steps().iter().position(|r| r.lead == step.lead)
            };
            match found {
                Some(j) => Ok((i, j)),
                None if by_valid_time => Err(FieldError::ValidTimeMismatch {
                    left: step.valid_time,
                    right: reference
                        .steps()
                        .get(i)
                        .or_else(|| reference.steps().last())
                        .map_or(step.valid_time, |r| r.valid_time),
                }),
                None => Err(FieldError::LeadTimeNotFound {
                    requested: step.lead,
                    available: reference.steps().iter().map(|r| r.lead).collect(),
                }),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let broadcast = reference.members().len() == 1;
    if !broadcast && reference.members() != forecast.members() {
        return Err(FieldError::shape_mismatch(
            forecast.members().len(),
            reference.members().len(),
            format!(
                "difference members {} vs {}",
                forecast.source(),
                reference.source()
            ),
        ));
    }

    let mut values = Vec::with_capacity(forecast.len());
    for &(fc_step, ref_step) in &step_pairs {
        for member in 0..forecast.members().len() {
            let ref_member = if broadcast { 0 } else { member };
            let lhs = forecast.layer(fc_step, member);
            let rhs = reference.layer(ref_step, ref_member);
            values.extend(lhs.iter().zip(rhs).map(|(a, b)| {
                if is_missing(*a) || is_missing(*b) {
                    MISSING
                } else {
                    a - b
                }
            }));
        }
    }

    debug!(
        forecast = forecast.source(),
        reference = reference.source(),
        by_valid_time,
        broadcast,
        "Computed field difference"
    );

    let meta = SliceMeta {
        source: format!("{} - {}", forecast.source(), reference.source()),
        ..forecast.meta()
    };
    FieldSlice::new(meta, forecast.grid().clone(), values)
}

/// Restrict a slice to the grid points inside `bbox`.
pub fn crop(field: &FieldSlice, bbox: &BoundingBox) -> Result<FieldSlice> {
    let (grid, kept) = field.grid().crop(bbox)?;
    let mut values = Vec::with_capacity(field.steps().len() * field.members().len() * kept.len());
    for step in 0..field.steps().len() {
        for member in 0..field.members().len() {
            let layer = field.layer(step, member);
            values.extend(kept.iter().map(|&i| layer[i]));
        }
    }
    debug!(
        source = field.source(),
        kept = kept.len(),
        of = field.point_count(),
        "Cropped field"
    );
    FieldSlice::new(field.meta(), Arc::new(grid), values)
}
