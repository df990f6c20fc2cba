//! Resolution of requested times and lead offsets to axis indices.
//!
//! Sources index their values by (cycle index, lead index). Requests name a
//! cycle start and lead offsets; comparisons between sources match on the
//! computed valid time `cycle + lead * step`, never on raw array positions.

use chrono::{DateTime, Duration, Utc};
use field_common::time::{lead_label, ForecastTime, DEFAULT_STEP_HOURS};
use serde::Serialize;
use tracing::debug;

use crate::error::{FieldError, Result};

/// Cycle starts and lead offsets of a source.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    cycles: Vec<DateTime<Utc>>,
    leads: Vec<u32>,
    step: Duration,
}

impl TimeAxis {
    /// Create an axis. Cycles and leads must be non-empty, sorted and unique.
    pub fn new(cycles: Vec<DateTime<Utc>>, leads: Vec<u32>, step: Duration) -> Result<Self> {
        if cycles.is_empty() {
            return Err(FieldError::invalid_time_axis("no cycles"));
        }
        if leads.is_empty() {
            return Err(FieldError::invalid_time_axis("no lead offsets"));
        }
        if !cycles.windows(2).all(|w| w[0] < w[1]) {
            return Err(FieldError::invalid_time_axis(
                "cycles must be sorted and unique",
            ));
        }
        if !leads.windows(2).all(|w| w[0] < w[1]) {
            return Err(FieldError::invalid_time_axis(
                "lead offsets must be sorted and unique",
            ));
        }
        if step <= Duration::zero() {
            return Err(FieldError::invalid_time_axis("step must be positive"));
        }
        // Resolved steps and lead labels count in whole minutes.
        if step != Duration::minutes(step.num_minutes()) {
            return Err(FieldError::invalid_time_axis(format!(
                "step must be a whole number of minutes, got {}s",
                step.num_seconds()
            )));
        }
        Ok(Self { cycles, leads, step })
    }

    /// Axis with the default six-hour lead spacing.
    pub fn six_hourly(cycles: Vec<DateTime<Utc>>, leads: Vec<u32>) -> Result<Self> {
        Self::new(cycles, leads, Duration::hours(DEFAULT_STEP_HOURS))
    }

    pub fn cycles(&self) -> &[DateTime<Utc>] {
        &self.cycles
    }

    pub fn leads(&self) -> &[u32] {
        &self.leads
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Valid time at a (cycle index, lead index) pair.
    pub fn valid_time(&self, cycle_index: usize, lead_index: usize) -> Option<DateTime<Utc>> {
        let cycle = self.cycles.get(cycle_index)?;
        let lead = self.leads.get(lead_index)?;
        Some(*cycle + self.step * (*lead as i32))
    }

    fn cycle_index(&self, cycle: DateTime<Utc>) -> Option<usize> {
        self.cycles.binary_search(&cycle).ok()
    }

    fn lead_index(&self, lead: u32) -> Option<usize> {
        self.leads.binary_search(&lead).ok()
    }

    fn first_valid_time(&self) -> DateTime<Utc> {
        self.cycles[0] + self.step * (self.leads[0] as i32)
    }

    fn last_valid_time(&self) -> DateTime<Utc> {
        self.cycles[self.cycles.len() - 1] + self.step * (self.leads[self.leads.len() - 1] as i32)
    }

    fn cycle_not_found(&self, requested: DateTime<Utc>) -> FieldError {
        FieldError::ValidTimeNotFound {
            requested,
            first: self.cycles[0],
            last: self.cycles[self.cycles.len() - 1],
        }
    }
}

/// One resolved (cycle, lead) position with its computed valid time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedStep {
    pub cycle_index: usize,
    pub lead_index: usize,
    pub cycle: DateTime<Utc>,
    /// Lead offset in steps of the source's axis.
    pub lead: u32,
    /// Minutes per lead step on the source's axis.
    pub step_minutes: i64,
    pub valid_time: DateTime<Utc>,
}

impl ResolvedStep {
    fn at(axis: &TimeAxis, cycle_index: usize, lead_index: usize) -> Self {
        let time = ForecastTime::new(axis.cycles[cycle_index], axis.leads[lead_index], axis.step);
        Self {
            cycle_index,
            lead_index,
            cycle: time.cycle,
            lead: time.lead,
            step_minutes: time.step_minutes,
            valid_time: time.valid_time(),
        }
    }

    pub fn forecast_time(&self) -> ForecastTime {
        ForecastTime {
            cycle: self.cycle,
            lead: self.lead,
            step_minutes: self.step_minutes,
        }
    }

    /// Lead label such as `+12h`.
    pub fn label(&self) -> String {
        lead_label(self.lead, Duration::minutes(self.step_minutes))
    }
}

/// Axis positions resolved for one request against one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIndices {
    pub steps: Vec<ResolvedStep>,
    /// True when a valid time was requested. Unanchored resolutions only
    /// support comparison by lead offset.
    pub anchored: bool,
}

impl ResolvedIndices {
    pub fn valid_times(&self) -> Vec<DateTime<Utc>> {
        self.steps.iter().map(|s| s.valid_time).collect()
    }

    pub fn leads(&self) -> Vec<u32> {
        self.steps.iter().map(|s| s.lead).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Resolve a requested cycle and lead offsets against a source's axis.
///
/// Without a requested time the axis's first cycle is used and the result
/// is not anchored. An empty lead list selects every lead on the axis.
/// Leads are returned in ascending offset order without duplicates.
pub fn resolve(
    requested: Option<DateTime<Utc>>,
    leads: &[u32],
    axis: &TimeAxis,
) -> Result<ResolvedIndices> {
    let cycle_index = match requested {
        Some(time) => axis
            .cycle_index(time)
            .ok_or_else(|| axis.cycle_not_found(time))?,
        None => 0,
    };

    let mut wanted: Vec<u32> = if leads.is_empty() {
        axis.leads.clone()
    } else {
        leads.to_vec()
    };
    wanted.sort_unstable();
    wanted.dedup();

    let steps = wanted
        .iter()
        .map(|&lead| {
            axis.lead_index(lead)
                .map(|lead_index| ResolvedStep::at(axis, cycle_index, lead_index))
                .ok_or_else(|| FieldError::LeadTimeNotFound {
                    requested: lead,
                    available: axis.leads.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        cycle = %axis.cycles[cycle_index],
        leads = ?wanted,
        anchored = requested.is_some(),
        "Resolved lead times"
    );

    Ok(ResolvedIndices {
        steps,
        anchored: requested.is_some(),
    })
}

/// Resolve the lead offsets of `axis` that reach `valid_times` from a fixed cycle.
///
/// Used for a second forecast source that shares the request's cycle but may
/// count its leads in a different step.
pub fn resolve_at_cycle(
    cycle: DateTime<Utc>,
    valid_times: &[DateTime<Utc>],
    axis: &TimeAxis,
) -> Result<ResolvedIndices> {
    let cycle_index = axis
        .cycle_index(cycle)
        .ok_or_else(|| axis.cycle_not_found(cycle))?;
    let step_minutes = axis.step.num_minutes();

    let steps = valid_times
        .iter()
        .map(|&target| {
            let offset = (target - cycle).num_minutes();
            if offset < 0 || offset % step_minutes != 0 {
                return Err(FieldError::ValidTimeNotFound {
                    requested: target,
                    first: axis.first_valid_time(),
                    last: axis.last_valid_time(),
                });
            }
            let lead = u32::try_from(offset / step_minutes).map_err(|_| {
                FieldError::ValidTimeNotFound {
                    requested: target,
                    first: axis.first_valid_time(),
                    last: axis.last_valid_time(),
                }
            })?;
            axis.lead_index(lead)
                .map(|lead_index| ResolvedStep::at(axis, cycle_index, lead_index))
                .ok_or_else(|| FieldError::LeadTimeNotFound {
                    requested: lead,
                    available: axis.leads.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedIndices {
        steps,
        anchored: true,
    })
}

/// Resolve wall-clock valid times against any cycle of `axis`.
///
/// Used for reference sources (typically analyses). When several
/// (cycle, lead) pairs reach the same valid time the smallest lead wins.
pub fn resolve_valid_times(
    valid_times: &[DateTime<Utc>],
    axis: &TimeAxis,
) -> Result<ResolvedIndices> {
    let steps = valid_times
        .iter()
        .map(|&target| {
            axis.leads
                .iter()
                .enumerate()
                .find_map(|(lead_index, &lead)| {
                    let cycle = target - axis.step * (lead as i32);
                    axis.cycle_index(cycle)
                        .map(|cycle_index| ResolvedStep::at(axis, cycle_index, lead_index))
                })
                .ok_or(FieldError::ValidTimeNotFound {
                    requested: target,
                    first: axis.first_valid_time(),
                    last: axis.last_valid_time(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedIndices {
        steps,
        anchored: true,
    })
}
