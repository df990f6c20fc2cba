//! Scalar training-loss curves.
//!
//! Curves arrive already parsed into `(step, value)` pairs. They are aligned
//! on the union of their steps so several runs can be plotted on one axis.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One run's loss curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossCurve {
    pub label: String,
    pub points: Vec<(u64, f64)>,
}

impl LossCurve {
    pub fn new(label: impl Into<String>, points: Vec<(u64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// Curves on a shared step axis. `values[run][i]` is `None` where run `run`
/// has no point at `steps[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedCurves {
    pub steps: Vec<u64>,
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Align curves on the sorted union of their steps.
///
/// When a run logs the same step twice the later value wins.
pub fn align_curves(curves: &[LossCurve]) -> AlignedCurves {
    let steps: Vec<u64> = curves
        .iter()
        .flat_map(|c| c.points.iter().map(|(s, _)| *s))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = curves
        .iter()
        .map(|curve| {
            let mut row = vec![None; steps.len()];
            for &(step, value) in &curve.points {
                if let Ok(i) = steps.binary_search(&step) {
                    row[i] = Some(value);
                }
            }
            row
        })
        .collect();

    AlignedCurves {
        steps,
        labels: curves.iter().map(|c| c.label.clone()).collect(),
        values,
    }
}

/// Trailing moving average over the last `window` present values.
///
/// Gaps stay gaps and are skipped by the window. A window of 0 or 1 returns
/// the input unchanged.
pub fn moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window <= 1 {
        return values.to_vec();
    }
    let mut recent: Vec<f64> = Vec::with_capacity(window);
    values
        .iter()
        .map(|v| {
            let v = (*v)?;
            if recent.len() == window {
                recent.remove(0);
            }
            recent.push(v);
            Some(recent.iter().sum::<f64>() / recent.len() as f64)
        })
        .collect()
}

/// Final and minimum loss of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSummary {
    pub label: String,
    pub points: usize,
    pub final_step: Option<u64>,
    pub final_value: Option<f64>,
    pub min_step: Option<u64>,
    pub min_value: Option<f64>,
}

pub fn summarize(curve: &LossCurve) -> CurveSummary {
    let last = curve.points.iter().max_by_key(|(s, _)| *s);
    let min = curve
        .points
        .iter()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|a, b| a.1.total_cmp(&b.1));
    CurveSummary {
        label: curve.label.clone(),
        points: curve.points.len(),
        final_step: last.map(|p| p.0),
        final_value: last.map(|p| p.1),
        min_step: min.map(|p| p.0),
        min_value: min.map(|p| p.1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_on_step_union() {
        let a = LossCurve::new("run-a", vec![(0, 2.0), (10, 1.5), (20, 1.0)]);
        let b = LossCurve::new("run-b", vec![(5, 3.0), (10, 2.5)]);
        let aligned = align_curves(&[a, b]);
        assert_eq!(aligned.steps, vec![0, 5, 10, 20]);
        assert_eq!(aligned.labels, vec!["run-a", "run-b"]);
        assert_eq!(aligned.values[0], vec![Some(2.0), None, Some(1.5), Some(1.0)]);
        assert_eq!(aligned.values[1], vec![None, Some(3.0), Some(2.5), None]);
    }

    #[test]
    fn test_moving_average_skips_gaps() {
        let values = vec![Some(1.0), Some(3.0), None, Some(5.0), Some(7.0)];
        assert_eq!(
            moving_average(&values, 2),
            vec![Some(1.0), Some(2.0), None, Some(4.0), Some(6.0)]
        );
        assert_eq!(moving_average(&values, 1), values);
    }

    #[test]
    fn test_summary() {
        let curve = LossCurve::new("run", vec![(0, 4.0), (100, 0.5), (200, 0.8)]);
        let summary = summarize(&curve);
        assert_eq!(summary.final_step, Some(200));
        assert_eq!(summary.final_value, Some(0.8));
        assert_eq!(summary.min_step, Some(100));
        assert_eq!(summary.min_value, Some(0.5));

        let empty = summarize(&LossCurve::new("empty", vec![]));
        assert_eq!(empty.points, 0);
        assert_eq!(empty.final_value, None);
    }
}
