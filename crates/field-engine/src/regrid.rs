//! Nearest-neighbour alignment of fields onto a target grid.
//!
//! For every target point the nearest source point is looked up through the
//! source grid's [`GridModel`] and its value copied. No smoothing is applied,
//! so discontinuous fields such as precipitation keep their exact values.
//! Target points outside the source domain become missing values.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{FieldError, Result};
use crate::grid::{Grid, GridModel, PointLookup};
use crate::types::{FieldSlice, MISSING};

/// Source index for each target point; `None` marks a point outside the source domain.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestMapping {
    indices: Vec<Option<usize>>,
    extrapolated: usize,
}

impl NearestMapping {
    /// Map every point of `target` onto its nearest point of `source`.
    ///
    /// Domain membership is tested with `config.coord_tolerance`.
    ///
    /// Fails with [`FieldError::CoverageBelowThreshold`] when the share of
    /// target points outside the source domain exceeds
    /// `config.max_missing_fraction`.
    pub fn build(source: &Grid, target: &Grid, config: &EngineConfig) -> Result<Self> {
        let total = target.point_count();
        let mut indices = Vec::with_capacity(total);
        let mut extrapolated = 0;

        for point in 0..total {
            let (lat, lon) = target
                .coordinates_of(point)
                .ok_or_else(|| FieldError::invalid_grid("target point index out of range"))?;
            let mapped = match source.nearest_point_within(
                lat,
                lon,
                config.nearest_fallback,
                config.coord_tolerance,
            ) {
                Ok(PointLookup::Inside(i)) => Some(i),
                Ok(PointLookup::Extrapolated(i)) if config.nearest_fallback => {
                    extrapolated += 1;
                    Some(i)
                }
                Ok(PointLookup::Extrapolated(_)) | Err(FieldError::OutOfDomain { .. }) => None,
                Err(e) => return Err(e),
            };
            indices.push(mapped);
        }

        let mapping = Self {
            indices,
            extrapolated,
        };
        let missing = mapping.missing_count();
        if total > 0 && missing as f64 / total as f64 > config.max_missing_fraction {
            return Err(FieldError::CoverageBelowThreshold {
                missing,
                total,
                max_fraction: config.max_missing_fraction,
            });
        }
        if missing > 0 {
            warn!(missing, total, "Target points outside source domain set to missing");
        }
        if extrapolated > 0 {
            warn!(extrapolated, total, "Target points extrapolated to nearest source point");
        }
        Ok(mapping)
    }

    /// Number of target points with no source point.
    pub fn missing_count(&self) -> usize {
        self.indices.iter().filter(|i| i.is_none()).count()
    }

    /// Number of target points filled from outside the source domain.
    pub fn extrapolated_count(&self) -> usize {
        self.extrapolated
    }

    pub fn indices(&self) -> &[Option<usize>] {
        &self.indices
    }

    /// Resample one layer of source values.
    pub fn apply(&self, source_values: &[f32]) -> Vec<f32> {
        self.indices
            .iter()
            .map(|i| i.map_or(MISSING, |i| source_values[i]))
            .collect()
    }
}

/// Align `field` onto `target`.
///
/// When the grids are structurally equal (within `config.coord_tolerance`)
/// the values pass through untouched; otherwise every layer is resampled
/// with nearest-neighbour lookup. The result's grid is always `target`.
pub fn align(field: &FieldSlice, target: &Arc<Grid>, config: &EngineConfig) -> Result<FieldSlice> {
    if Arc::ptr_eq(field.grid(), target) || field.grid().same_layout(target, config.coord_tolerance)
    {
        debug!(source = field.source(), "Grids identical, alignment is a passthrough");
        return FieldSlice::new(field.meta(), target.clone(), field.values().to_vec());
    }

    let mapping = NearestMapping::build(field.grid(), target, config)?;
    let layers = field.steps().len() * field.members().len();
    let mut values = Vec::with_capacity(layers * target.point_count());
    for step in 0..field.steps().len() {
        for member in 0..field.members().len() {
            values.extend(mapping.apply(field.layer(step, member)));
        }
    }

    debug!(
        source = field.source(),
        from = %field.grid().descriptor(),
        to = %target.descriptor(),
        missing_points = mapping.missing_count(),
        "Aligned field"
    );
    FieldSlice::new(field.meta(), target.clone(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::ReduceMode;
    use crate::types::fixtures::slice;
    use crate::types::is_missing;

    fn two_by_two() -> Arc<Grid> {
        Arc::new(Grid::regular(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap())
    }

    #[test]
    fn test_nearest_neighbour_picks_closest_cell() {
        let source = slice("fc", two_by_two(), &[0], vec![ReduceMode::Member(0)], vec![10.0, 20.0, 30.0, 40.0]);
        let target = Arc::new(Grid::irregular(vec![(0.1, 0.1)]).unwrap());
        let aligned = align(&source, &target, &EngineConfig::default()).unwrap();
        assert_eq!(aligned.values(), &[10.0]);
        assert!(Arc::ptr_eq(aligned.grid(), &target));
    }

    #[test]
    fn test_identity_on_regular_and_irregular() {
        let config = EngineConfig::default();
        let values = vec![1.5, f32::NAN, 3.5, 4.5];

        let regular = slice("fc", two_by_two(), &[0], vec![ReduceMode::Member(0)], values.clone());
        let same = Arc::new(Grid::regular(vec![0.0, 1.0], vec![0.0, 1.0 + 1e-9]).unwrap());
        let aligned = align(&regular, &same, &config).unwrap();
        assert_eq!(aligned.values()[0], 1.5);
        assert!(is_missing(aligned.values()[1]));
        assert_eq!(&aligned.values()[2..], &[3.5, 4.5]);

        let mesh = Arc::new(Grid::irregular(vec![(0.0, 0.0), (5.0, 5.0), (0.0, 5.0), (5.0, 0.0)]).unwrap());
        let irregular = slice("fc", mesh.clone(), &[0], vec![ReduceMode::Member(0)], values);
        let aligned = align(&irregular, &mesh, &config).unwrap();
        assert_eq!(aligned.values()[3], 4.5);
        assert!(!mesh.is_indexed(), "fast path must not consult the spatial index");
    }

    #[test]
    fn test_out_of_domain_points_become_missing() {
        let source = slice("fc", two_by_two(), &[0, 1], vec![ReduceMode::Member(0)], vec![
            10.0, 20.0, 30.0, 40.0, 11.0, 21.0, 31.0, 41.0,
        ]);
        let target = Arc::new(Grid::irregular(vec![(0.9, 0.9), (30.0, 30.0)]).unwrap());
        let aligned = align(&source, &target, &EngineConfig::default()).unwrap();
        assert_eq!(aligned.layer(0, 0)[0], 40.0);
        assert!(is_missing(aligned.layer(0, 0)[1]));
        assert_eq!(aligned.layer(1, 0)[0], 41.0);
        assert!(is_missing(aligned.layer(1, 0)[1]));
    }

    #[test]
    fn test_strict_mode_fails_on_missing_coverage() {
        let source = slice("fc", two_by_two(), &[0], vec![ReduceMode::Member(0)], vec![1.0; 4]);
        let target = Arc::new(Grid::irregular(vec![(0.5, 0.5), (30.0, 30.0)]).unwrap());

        let err = align(&source, &target, &EngineConfig::strict()).unwrap_err();
        assert_eq!(
            err,
            FieldError::CoverageBelowThreshold {
                missing: 1,
                total: 2,
                max_fraction: 0.0
            }
        );

        let config = EngineConfig {
            max_missing_fraction: 0.5,
            ..EngineConfig::default()
        };
        assert!(align(&source, &target, &config).is_ok());
    }

    #[test]
    fn test_irregular_source_onto_regular_target() {
        let mesh = Arc::new(
            Grid::irregular(vec![(0.0, 0.0), (0.0, 2.0), (2.0, 0.0), (2.0, 2.0), (1.0, 1.0)]).unwrap(),
        );
        let source = slice("mesh", mesh, &[0], vec![ReduceMode::Member(0)], vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let target = Arc::new(Grid::regular(vec![0.1, 1.1, 3.0], vec![0.2, 1.8]).unwrap());

        let aligned = align(&source, &target, &EngineConfig::default()).unwrap();
        // Row lat=3.0 lies outside the mesh hull.
        assert_eq!(&aligned.values()[..4], &[1.0, 2.0, 5.0, 5.0]);
        assert!(aligned.values()[4..].iter().all(|v| is_missing(*v)));

        let fallback = EngineConfig {
            nearest_fallback: true,
            ..EngineConfig::default()
        };
        let mapping = NearestMapping::build(source.grid(), &target, &fallback).unwrap();
        assert_eq!(mapping.missing_count(), 0);
        assert_eq!(mapping.extrapolated_count(), 2);
        assert_eq!(mapping.apply(source.values())[4..], [3.0, 4.0]);
    }

    #[test]
    fn test_coord_tolerance_sets_domain_edge() {
        let mesh = Arc::new(Grid::irregular(vec![(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]).unwrap());
        let source = slice("mesh", mesh, &[0], vec![ReduceMode::Member(0)], vec![1.0, 2.0, 3.0, 4.0]);
        let target = Arc::new(Grid::irregular(vec![(1.0005, 1.0)]).unwrap());

        let aligned = align(&source, &target, &EngineConfig::default()).unwrap();
        assert!(is_missing(aligned.values()[0]));

        let loose = EngineConfig {
            coord_tolerance: 1e-2,
            ..EngineConfig::default()
        };
        let aligned = align(&source, &target, &loose).unwrap();
        assert_eq!(aligned.values(), &[4.0]);
    }
}
