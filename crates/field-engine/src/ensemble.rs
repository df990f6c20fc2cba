//! Ensemble-member reduction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};

/// Ensemble layout of a source. Member 0 is the control (or only) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleDescriptor {
    member_count: usize,
}

impl EnsembleDescriptor {
    pub fn new(member_count: usize) -> Result<Self> {
        if member_count == 0 {
            return Err(FieldError::InsufficientMembers {
                required: 1,
                available: 0,
            });
        }
        Ok(Self { member_count })
    }

    /// A deterministic source with a single run.
    pub fn deterministic() -> Self {
        Self { member_count: 1 }
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    pub fn is_deterministic(&self) -> bool {
        self.member_count == 1
    }
}

/// How to collapse the member dimension.
///
/// The derived ordering (members by index, then mean, then spread) is the
/// member ordering used by verification output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceMode {
    /// Select a single member.
    Member(usize),
    /// Ensemble mean.
    Mean,
    /// Sample standard deviation across members.
    Spread,
}

impl fmt::Display for ReduceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(i) => write!(f, "{}", i),
            Self::Mean => write!(f, "mean"),
            Self::Spread => write!(f, "spread"),
        }
    }
}

impl ReduceMode {
    /// Parse `mean`, `spread`, or a member index.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Some(Self::Mean),
            "spread" | "std" => Some(Self::Spread),
            other => other.parse().ok().map(Self::Member),
        }
    }
}

/// Values laid out as `[step][member][point]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleArray {
    steps: usize,
    members: usize,
    points: usize,
    data: Vec<f32>,
}

impl EnsembleArray {
    pub fn new(steps: usize, members: usize, points: usize, data: Vec<f32>) -> Result<Self> {
        let expected = steps * members * points;
        if data.len() != expected {
            return Err(FieldError::shape_mismatch(expected, data.len(), "ensemble array"));
        }
        Ok(Self {
            steps,
            members,
            points,
            data,
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn members(&self) -> usize {
        self.members
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// Values of one member at one step.
    pub fn member_values(&self, step: usize, member: usize) -> &[f32] {
        let start = (step * self.members + member) * self.points;
        &self.data[start..start + self.points]
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Collapse the member dimension of `array`, returning a one-member array.
///
/// Each grid point and step is reduced independently. A missing (NaN) member
/// value makes the mean and spread at that point missing.
pub fn reduce(array: &EnsembleArray, mode: ReduceMode) -> Result<EnsembleArray> {
    let members = array.members;
    match mode {
        ReduceMode::Member(index) => {
            if index >= members {
                return Err(FieldError::MemberIndexOutOfRange {
                    index,
                    member_count: members,
                });
            }
            let mut data = Vec::with_capacity(array.steps * array.points);
            for step in 0..array.steps {
                data.extend_from_slice(array.member_values(step, index));
            }
            EnsembleArray::new(array.steps, 1, array.points, data)
        }
        ReduceMode::Mean | ReduceMode::Spread => {
            if members < 2 {
                return Err(FieldError::InsufficientMembers {
                    required: 2,
                    available: members,
                });
            }
            let mut data = Vec::with_capacity(array.steps * array.points);
            for step in 0..array.steps {
                for point in 0..array.points {
                    let (mean, spread) = member_stats(array, step, point);
                    data.push(if mode == ReduceMode::Mean { mean } else { spread });
                }
            }
            EnsembleArray::new(array.steps, 1, array.points, data)
        }
    }
}

/// Mean and sample standard deviation across members at one point.
fn member_stats(array: &EnsembleArray, step: usize, point: usize) -> (f32, f32) {
    let n = array.members;
    let mut sum = 0.0f64;
    for member in 0..n {
        let v = array.member_values(step, member)[point];
        if v.is_nan() {
            return (f32::NAN, f32::NAN);
        }
        sum += v as f64;
    }
    let mean = sum / n as f64;

    let mut sq = 0.0f64;
    for member in 0..n {
        let d = array.member_values(step, member)[point] as f64 - mean;
        sq += d * d;
    }
    let spread = (sq / (n - 1) as f64).sqrt();
    (mean as f32, spread as f32)
}
