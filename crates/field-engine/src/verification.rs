//! Flattening of field slices into verification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ensemble::ReduceMode;
use crate::grid::GridModel;
use crate::types::{is_missing, FieldSlice};

/// One value at one location, lead time and member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub source: String,
    pub variable: String,
    pub valid_time: DateTime<Utc>,
    /// Lead offset in steps of the producing source's axis.
    pub lead_time: u32,
    pub member: ReduceMode,
    pub latitude: f64,
    pub longitude: f64,
    /// `None` marks a missing value.
    pub value: Option<f32>,
}

impl VerificationRecord {
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// Flatten slices into records.
///
/// Records are ordered by (variable, valid time, lead time, member) and then
/// by grid-point storage order. Groups with equal keys keep input order.
/// Each slice contributes exactly `steps x members x points` records, with
/// missing values emitted as `None`.
pub fn convert(slices: &[FieldSlice]) -> Vec<VerificationRecord> {
    let mut groups: Vec<(usize, usize, usize)> = Vec::new();
    for (s, slice) in slices.iter().enumerate() {
        for step in 0..slice.steps().len() {
            for member in 0..slice.members().len() {
                groups.push((s, step, member));
            }
        }
    }

    // Stable sort keeps input order among equal keys.
    groups.sort_by(|a, b| group_key(slices, *a).cmp(&group_key(slices, *b)));

    let total: usize = slices.iter().map(|s| s.len()).sum();
    let mut records = Vec::with_capacity(total);

    for (s, step, member) in groups {
        let slice = &slices[s];
        let resolved = slice.steps()[step];
        let mode = slice.members()[member];
        let grid = slice.grid();
        for (point, value) in slice.layer(step, member).iter().enumerate() {
            let (latitude, longitude) = grid.coordinates_of(point).unwrap_or((f64::NAN, f64::NAN));
            records.push(VerificationRecord {
                source: slice.source().to_string(),
                variable: slice.variable().to_string(),
                valid_time: resolved.valid_time,
                lead_time: resolved.lead,
                member: mode,
                latitude,
                longitude,
                value: if is_missing(*value) { None } else { Some(*value) },
            });
        }
    }

    debug!(slices = slices.len(), records = records.len(), "Converted verification records");
    records
}

fn group_key(
    slices: &[FieldSlice],
    (s, step, member): (usize, usize, usize),
) -> (&str, DateTime<Utc>, u32, ReduceMode) {
    let slice = &slices[s];
    let resolved = &slice.steps()[step];
    (
        slice.variable(),
        resolved.valid_time,
        resolved.lead,
        slice.members()[member],
    )
}

/// Expected record count for `slices`.
pub fn expected_record_count(slices: &[FieldSlice]) -> usize {
    slices
        .iter()
        .map(|s| s.steps().len() * s.members().len() * s.point_count())
        .sum()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::grid::Grid;
    use crate::types::fixtures::slice;
    use crate::types::MISSING;

    #[test]
    fn test_record_count_and_missing_markers() {
        let grid = Arc::new(Grid::irregular(vec![(60.0, 10.0), (61.0, 11.0), (62.0, 12.0)]).unwrap());
        let values = vec![
            1.0, 2.0, MISSING, // lead 0, member 0
            4.0, 5.0, 6.0, // lead 0, member 1
            7.0, 8.0, 9.0, // lead 1, member 0
            10.0, MISSING, 12.0, // lead 1, member 1
        ];
        let s = slice("fc", grid, &[0, 1], vec![ReduceMode::Member(0), ReduceMode::Member(1)], values);
        let records = convert(std::slice::from_ref(&s));

        assert_eq!(records.len(), 2 * 2 * 3);
        assert_eq!(records.len(), expected_record_count(std::slice::from_ref(&s)));
        assert_eq!(records.iter().filter(|r| r.is_missing()).count(), 2);
        assert_eq!(records[2].value, None);
        assert_eq!(records[2].latitude, 62.0);
        assert_eq!(records[2].longitude, 12.0);
        assert_eq!(records[10].value, None);
        assert_eq!(records[10].member, ReduceMode::Member(1));
        assert_eq!(records[10].lead_time, 1);
    }

    #[test]
    fn test_ordering_across_slices() {
        let grid = Arc::new(Grid::irregular(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap());
        let late = slice("b", grid.clone(), &[2], vec![ReduceMode::Mean, ReduceMode::Member(0)], vec![5.0, 6.0, 7.0, 8.0]);
        let early = slice("a", grid, &[1], vec![ReduceMode::Member(0)], vec![1.0, 2.0]);

        let records = convert(&[late, early]);
        let keys: Vec<(u32, ReduceMode, Option<f32>)> =
            records.iter().map(|r| (r.lead_time, r.member, r.value)).collect();
        assert_eq!(
            keys,
            vec![
                (1, ReduceMode::Member(0), Some(1.0)),
                (1, ReduceMode::Member(0), Some(2.0)),
                (2, ReduceMode::Member(0), Some(7.0)),
                (2, ReduceMode::Member(0), Some(8.0)),
                (2, ReduceMode::Mean, Some(5.0)),
                (2, ReduceMode::Mean, Some(6.0)),
            ]
        );
    }

    #[test]
    fn test_conversion_is_reproducible() {
        let grid = Arc::new(Grid::regular(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap());
        let a = slice("a", grid.clone(), &[0, 1], vec![ReduceMode::Member(0)], (0..8).map(|v| v as f32).collect());
        let b = slice("b", grid, &[0, 1], vec![ReduceMode::Member(0)], (8..16).map(|v| v as f32).collect());
        let first = convert(&[a.clone(), b.clone()]);
        let second = convert(&[a, b]);
        assert_eq!(first, second);
        // Equal keys keep input order: source a before source b at each lead.
        assert_eq!(first[0].source, "a");
        assert_eq!(first[4].source, "b");
        assert_eq!(first[8].source, "a");
    }

    #[test]
    fn test_record_serializes_missing_as_null() {
        let record = VerificationRecord {
            source: "fc".to_string(),
            variable: "air_temperature_2m".to_string(),
            valid_time: crate::types::fixtures::cycle(),
            lead_time: 0,
            member: ReduceMode::Mean,
            latitude: 1.0,
            longitude: 2.0,
            value: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["value"].is_null());
        assert_eq!(json["member"], "mean");
    }
}
