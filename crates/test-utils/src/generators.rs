//! Generators for synthetic grids, time axes and sources.
//!
//! Everything here is deterministic so tests can compute expected values
//! by hand.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use field_engine::{EnsembleDescriptor, Grid, GridModel, InMemorySource, TimeAxis};

use crate::fixtures::base_cycle;

/// Creates a regular grid with `nlat x nlon` points spaced `spacing` degrees
/// apart, starting at `(lat0, lon0)`.
///
/// # Example
///
/// ```
/// use test_utils::regular_grid;
/// use field_engine::GridModel;
///
/// let grid = regular_grid(3, 4, 50.0, 0.0, 0.5);
/// assert_eq!(grid.point_count(), 12);
/// assert_eq!(grid.coordinates_of(5), Some((50.5, 0.5)));
/// ```
pub fn regular_grid(nlat: usize, nlon: usize, lat0: f64, lon0: f64, spacing: f64) -> Arc<Grid> {
    let lat_axis = (0..nlat).map(|i| lat0 + i as f64 * spacing).collect();
    let lon_axis = (0..nlon).map(|j| lon0 + j as f64 * spacing).collect();
    Arc::new(Grid::regular(lat_axis, lon_axis).expect("valid regular grid"))
}

/// Creates an irregular mesh of `n` points scattered inside
/// `[lat0, lat0 + extent] x [lon0, lon0 + extent]`.
///
/// Points come from a fixed linear congruential sequence, so the same
/// arguments always produce the same mesh in the same storage order.
pub fn irregular_grid(n: usize, lat0: f64, lon0: f64, extent: f64, seed: u64) -> Arc<Grid> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let points = (0..n)
        .map(|_| {
            let lat = lat0 + next() * extent;
            let lon = lon0 + next() * extent;
            (lat, lon)
        })
        .collect();
    Arc::new(Grid::irregular(points).expect("valid irregular grid"))
}

/// Irregular mesh holding the same points as a regular grid, in a shuffled
/// storage order. Returns the mesh and, for each mesh point, its index in
/// the regular grid.
pub fn shuffled_mesh(grid: &Grid) -> (Arc<Grid>, Vec<usize>) {
    let n = grid.point_count();
    // Stride permutation; 7 is coprime with every n not divisible by 7.
    let stride = if n % 7 == 0 { 1 } else { 7 };
    let order: Vec<usize> = (0..n).map(|i| (i * stride + 3) % n.max(1)).collect();
    let points = order
        .iter()
        .map(|&i| grid.coordinates_of(i).expect("index within grid"))
        .collect();
    (
        Arc::new(Grid::irregular(points).expect("valid irregular grid")),
        order,
    )
}

/// Time axis with `cycles` consecutive six-hourly cycles from [`base_cycle`].
pub fn six_hourly_axis(cycles: usize, leads: Vec<u32>) -> TimeAxis {
    stepped_axis(cycles, Duration::hours(6), leads, Duration::hours(6))
}

/// Time axis with `cycles` cycles spaced `cycle_every`, leads counted in `step`.
pub fn stepped_axis(cycles: usize, cycle_every: Duration, leads: Vec<u32>, step: Duration) -> TimeAxis {
    let cycles = (0..cycles)
        .map(|i| base_cycle() + cycle_every * i as i32)
        .collect();
    TimeAxis::new(cycles, leads, step).expect("valid time axis")
}

/// Value for one (valid time, member, point) of a synthetic field.
///
/// Depends only on the valid time, never on the (cycle, lead) pair that
/// reached it, so sources with different axes agree wherever they overlap.
pub fn valid_time_pattern(valid_time: DateTime<Utc>, member: usize, point: usize) -> f32 {
    let hours = (valid_time - base_cycle()).num_hours() as f32;
    hours * 100.0 + member as f32 * 10.0 + point as f32
}

/// Builds an in-memory source whose `variable` is filled by `pattern`.
///
/// `pattern` receives (valid time, member, point).
pub fn source_with_pattern(
    name: &str,
    grid: Arc<Grid>,
    axis: TimeAxis,
    members: usize,
    variable: &str,
    pattern: impl Fn(DateTime<Utc>, usize, usize) -> f32,
) -> InMemorySource {
    let points = grid.point_count();
    let mut values = Vec::with_capacity(axis.cycles().len() * axis.leads().len() * members * points);
    for c in 0..axis.cycles().len() {
        for l in 0..axis.leads().len() {
            let valid = axis.valid_time(c, l).expect("index within axis");
            for m in 0..members {
                for p in 0..points {
                    values.push(pattern(valid, m, p));
                }
            }
        }
    }
    InMemorySource::new(
        name,
        grid,
        axis,
        EnsembleDescriptor::new(members).expect("at least one member"),
    )
    .with_variable(variable, values)
    .expect("values match source dimensions")
}

/// Ensemble source filled with [`valid_time_pattern`].
pub fn ensemble_source(name: &str, grid: Arc<Grid>, axis: TimeAxis, members: usize, variable: &str) -> InMemorySource {
    source_with_pattern(name, grid, axis, members, variable, valid_time_pattern)
}

/// Temperature-like values in Kelvin, from about 250K to 310K across the grid.
pub fn temperature_values(points: usize) -> Vec<f32> {
    (0..points)
        .map(|p| 250.0 + 60.0 * p as f32 / points.max(1) as f32)
        .collect()
}
