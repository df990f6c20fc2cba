//! Spatial discretization of forecast sources.
//!
//! A source is either a regular lat/lon grid (cross product of two monotonic
//! axes, stored latitude-major) or an irregular mesh of sample points whose
//! storage order indexes the value arrays. Both shapes sit behind the
//! [`GridModel`] capability trait so the regridder is written once.

mod index;

pub use index::SpatialIndex;

use std::fmt;

use field_common::BoundingBox;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FieldError, Result};

/// Coordinate units a source stores its grid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateUnits {
    #[default]
    Degrees,
    Radians,
}

impl CoordinateUnits {
    /// Parse from string (case-insensitive), e.g. `deg` or `rad`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deg" | "degrees" => Some(Self::Degrees),
            "rad" | "radians" => Some(Self::Radians),
            _ => None,
        }
    }
}

/// Layout of a source's grid points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridDescriptor {
    /// Cross product of two monotonic axes, point index = lat_index * lon_count + lon_index.
    Regular { lat_axis: Vec<f64>, lon_axis: Vec<f64> },
    /// Unordered sample locations as `(lat, lon)`; storage order is significant.
    Irregular { points: Vec<(f64, f64)> },
}

impl GridDescriptor {
    /// Number of grid points.
    pub fn point_count(&self) -> usize {
        match self {
            Self::Regular { lat_axis, lon_axis } => lat_axis.len() * lon_axis.len(),
            Self::Irregular { points } => points.len(),
        }
    }

    /// `(lat, lon)` of a point in storage order.
    pub fn coordinates_of(&self, index: usize) -> Option<(f64, f64)> {
        match self {
            Self::Regular { lat_axis, lon_axis } => {
                if index >= lat_axis.len() * lon_axis.len() {
                    return None;
                }
                let nlon = lon_axis.len();
                Some((lat_axis[index / nlon], lon_axis[index % nlon]))
            }
            Self::Irregular { points } => points.get(index).copied(),
        }
    }

    /// Structural equality: same shape and coordinates within `tolerance`.
    pub fn same_layout(&self, other: &GridDescriptor, tolerance: f64) -> bool {
        match (self, other) {
            (
                Self::Regular { lat_axis: a_lat, lon_axis: a_lon },
                Self::Regular { lat_axis: b_lat, lon_axis: b_lon },
            ) => axes_close(a_lat, b_lat, tolerance) && axes_close(a_lon, b_lon, tolerance),
            (Self::Irregular { points: a }, Self::Irregular { points: b }) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(p, q)| {
                        (p.0 - q.0).abs() <= tolerance && (p.1 - q.1).abs() <= tolerance
                    })
            }
            _ => false,
        }
    }

    /// Convert a radian descriptor to degrees.
    pub fn to_degrees(&self) -> Self {
        match self {
            Self::Regular { lat_axis, lon_axis } => Self::Regular {
                lat_axis: lat_axis.iter().map(|v| v.to_degrees()).collect(),
                lon_axis: lon_axis.iter().map(|v| v.to_degrees()).collect(),
            },
            Self::Irregular { points } => Self::Irregular {
                points: points
                    .iter()
                    .map(|(lat, lon)| (lat.to_degrees(), lon.to_degrees()))
                    .collect(),
            },
        }
    }

    /// Enclosing bounding box of all grid points.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            Self::Regular { lat_axis, lon_axis } => {
                let lat = BoundingBox::enclosing(lat_axis.iter().map(|&v| (v, 0.0)))?;
                let lon = BoundingBox::enclosing(lon_axis.iter().map(|&v| (0.0, v)))?;
                Some(BoundingBox::new(lon.min_lon, lat.min_lat, lon.max_lon, lat.max_lat))
            }
            Self::Irregular { points } => BoundingBox::enclosing(points.iter().copied()),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Regular { lat_axis, lon_axis } => {
                validate_axis("lat_axis", lat_axis)?;
                validate_axis("lon_axis", lon_axis)
            }
            Self::Irregular { points } => {
                if points.is_empty() {
                    return Err(FieldError::invalid_grid("irregular grid has no points"));
                }
                if let Some(i) = points
                    .iter()
                    .position(|(lat, lon)| !lat.is_finite() || !lon.is_finite())
                {
                    return Err(FieldError::invalid_grid(format!(
                        "irregular grid point {} has non-finite coordinates",
                        i
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for GridDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular { lat_axis, lon_axis } => {
                write!(f, "regular {}x{}", lat_axis.len(), lon_axis.len())
            }
            Self::Irregular { points } => write!(f, "irregular {} points", points.len()),
        }
    }
}

fn axes_close(a: &[f64], b: &[f64], tolerance: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
}

fn validate_axis(name: &str, axis: &[f64]) -> Result<()> {
    if axis.is_empty() {
        return Err(FieldError::invalid_grid(format!("{} is empty", name)));
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(FieldError::invalid_grid(format!("{} has non-finite values", name)));
    }
    if axis.len() > 1 {
        let ascending = axis[1] > axis[0];
        let monotonic = axis
            .windows(2)
            .all(|w| if ascending { w[1] > w[0] } else { w[1] < w[0] });
        if !monotonic {
            return Err(FieldError::invalid_grid(format!(
                "{} is not strictly monotonic",
                name
            )));
        }
    }
    Ok(())
}

/// Result of a nearest-point lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLookup {
    /// The query lies within the grid's domain.
    Inside(usize),
    /// The query lies outside the domain; the index is the clamped nearest point.
    Extrapolated(usize),
}

impl PointLookup {
    pub fn index(&self) -> usize {
        match self {
            Self::Inside(i) | Self::Extrapolated(i) => *i,
        }
    }

    pub fn is_extrapolated(&self) -> bool {
        matches!(self, Self::Extrapolated(_))
    }
}

/// Uniform capability interface over grid shapes.
pub trait GridModel {
    /// Number of grid points (the length of every value array on this grid).
    fn point_count(&self) -> usize;

    /// `(lat, lon)` of a point in storage order, `None` past the end.
    fn coordinates_of(&self, index: usize) -> Option<(f64, f64)>;

    /// Nearest grid point to `(lat, lon)`.
    ///
    /// Regular grids always answer, flagging queries outside the axis ranges
    /// as [`PointLookup::Extrapolated`]. Irregular grids fail with
    /// [`FieldError::OutOfDomain`] outside their convex hull unless
    /// `fallback` is set.
    ///
    /// Coordinates are compared on a flat lat/lon plane in the grid's own
    /// longitude convention. Longitudes do not wrap: on a grid spanning
    /// `0..360` a query at `-10` is outside the domain while `350` is inside.
    fn nearest_point(&self, lat: f64, lon: f64, fallback: bool) -> Result<PointLookup>;
}

/// A validated grid plus its lazily built spatial index.
///
/// The index is built on the first irregular lookup and never changes
/// afterwards, so a `Grid` can be shared read-only across threads.
#[derive(Debug)]
pub struct Grid {
    descriptor: GridDescriptor,
    tolerance: f64,
    index: OnceCell<SpatialIndex>,
}

impl Grid {
    /// Create a grid from a descriptor in degrees.
    pub fn new(descriptor: GridDescriptor) -> Result<Self> {
        Self::with_tolerance(descriptor, crate::config::DEFAULT_COORD_TOLERANCE)
    }

    /// Create a grid with an explicit domain tolerance in degrees.
    pub fn with_tolerance(descriptor: GridDescriptor, tolerance: f64) -> Result<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            tolerance,
            index: OnceCell::new(),
        })
    }

    /// Create a grid from a descriptor in the given units.
    pub fn from_units(descriptor: GridDescriptor, units: CoordinateUnits) -> Result<Self> {
        match units {
            CoordinateUnits::Degrees => Self::new(descriptor),
            CoordinateUnits::Radians => Self::new(descriptor.to_degrees()),
        }
    }

    /// Regular grid shortcut.
    pub fn regular(lat_axis: Vec<f64>, lon_axis: Vec<f64>) -> Result<Self> {
        Self::new(GridDescriptor::Regular { lat_axis, lon_axis })
    }

    /// Irregular grid shortcut.
    pub fn irregular(points: Vec<(f64, f64)>) -> Result<Self> {
        Self::new(GridDescriptor::Irregular { points })
    }

    pub fn descriptor(&self) -> &GridDescriptor {
        &self.descriptor
    }

    /// Structural equality within `tolerance`, ignoring index state.
    pub fn same_layout(&self, other: &Grid, tolerance: f64) -> bool {
        self.descriptor.same_layout(&other.descriptor, tolerance)
    }

    /// Whether the spatial index has been built.
    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    /// Spatial index for irregular grids, built on first use.
    pub fn spatial_index(&self) -> Option<&SpatialIndex> {
        match &self.descriptor {
            GridDescriptor::Irregular { points } => Some(self.index.get_or_init(|| {
                let index = SpatialIndex::build(points);
                debug!(
                    points = points.len(),
                    buckets = index.bucket_count(),
                    hull_vertices = index.hull_len(),
                    "Built spatial index"
                );
                index
            })),
            GridDescriptor::Regular { .. } => None,
        }
    }

    /// Regular grid spanning `bbox` at `resolution` degrees on both axes.
    ///
    /// Axes start at the box's minimum corner; the last row and column fall
    /// on or inside the maximum edge.
    pub fn regular_covering(bbox: &BoundingBox, resolution: f64, tolerance: f64) -> Result<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(FieldError::invalid_grid(format!(
                "resolution must be a positive number of degrees, got {}",
                resolution
            )));
        }
        let axis = |min: f64, max: f64| -> Vec<f64> {
            let n = ((max - min) / resolution + 1e-9).floor().max(0.0) as usize + 1;
            (0..n).map(|i| min + i as f64 * resolution).collect()
        };
        Self::with_tolerance(
            GridDescriptor::Regular {
                lat_axis: axis(bbox.min_lat, bbox.max_lat),
                lon_axis: axis(bbox.min_lon, bbox.max_lon),
            },
            tolerance,
        )
    }

    /// [`GridModel::nearest_point`] with an explicit domain tolerance in degrees.
    pub fn nearest_point_within(
        &self,
        lat: f64,
        lon: f64,
        fallback: bool,
        tolerance: f64,
    ) -> Result<PointLookup> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(FieldError::OutOfDomain { lat, lon });
        }

        match &self.descriptor {
            GridDescriptor::Regular { lat_axis, lon_axis } => {
                let (i, lat_outside) = nearest_on_axis(lat_axis, lat, tolerance);
                let (j, lon_outside) = nearest_on_axis(lon_axis, lon, tolerance);
                let index = i * lon_axis.len() + j;
                if lat_outside || lon_outside {
                    Ok(PointLookup::Extrapolated(index))
                } else {
                    Ok(PointLookup::Inside(index))
                }
            }
            GridDescriptor::Irregular { .. } => {
                let index = self
                    .spatial_index()
                    .ok_or_else(|| FieldError::invalid_grid("missing spatial index"))?;
                let nearest = index.nearest(lat, lon);
                if index.contains(lat, lon, tolerance) {
                    Ok(PointLookup::Inside(nearest))
                } else if fallback {
                    Ok(PointLookup::Extrapolated(nearest))
                } else {
                    Err(FieldError::OutOfDomain { lat, lon })
                }
            }
        }
    }

    /// Restrict the grid to points inside `bbox`.
    ///
    /// Returns the cropped grid and, for each kept point, its index in this grid.
    /// A regular grid stays regular.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<(Grid, Vec<usize>)> {
        match &self.descriptor {
            GridDescriptor::Regular { lat_axis, lon_axis } => {
                let lat_keep: Vec<usize> = (0..lat_axis.len())
                    .filter(|&i| lat_axis[i] >= bbox.min_lat && lat_axis[i] <= bbox.max_lat)
                    .collect();
                let lon_keep: Vec<usize> = (0..lon_axis.len())
                    .filter(|&j| lon_axis[j] >= bbox.min_lon && lon_axis[j] <= bbox.max_lon)
                    .collect();
                if lat_keep.is_empty() || lon_keep.is_empty() {
                    return Err(FieldError::invalid_grid("crop leaves no grid points"));
                }

                let nlon = lon_axis.len();
                let mut kept = Vec::with_capacity(lat_keep.len() * lon_keep.len());
                for &i in &lat_keep {
                    for &j in &lon_keep {
                        kept.push(i * nlon + j);
                    }
                }
                let grid = Grid::with_tolerance(
                    GridDescriptor::Regular {
                        lat_axis: lat_keep.iter().map(|&i| lat_axis[i]).collect(),
                        lon_axis: lon_keep.iter().map(|&j| lon_axis[j]).collect(),
                    },
                    self.tolerance,
                )?;
                Ok((grid, kept))
            }
            GridDescriptor::Irregular { points } => {
                let kept: Vec<usize> = points
                    .iter()
                    .enumerate()
                    .filter(|(_, (lat, lon))| bbox.contains(*lat, *lon))
                    .map(|(i, _)| i)
                    .collect();
                if kept.is_empty() {
                    return Err(FieldError::invalid_grid("crop leaves no grid points"));
                }
                let grid = Grid::with_tolerance(
                    GridDescriptor::Irregular {
                        points: kept.iter().map(|&i| points[i]).collect(),
                    },
                    self.tolerance,
                )?;
                Ok((grid, kept))
            }
        }
    }
}

impl GridModel for Grid {
    fn point_count(&self) -> usize {
        self.descriptor.point_count()
    }

    fn coordinates_of(&self, index: usize) -> Option<(f64, f64)> {
        self.descriptor.coordinates_of(index)
    }

    fn nearest_point(&self, lat: f64, lon: f64, fallback: bool) -> Result<PointLookup> {
        self.nearest_point_within(lat, lon, fallback, self.tolerance)
    }
}

/// Binary search for the nearest axis entry; also reports whether `value`
/// lies outside the axis range. Ties go to the lower index.
fn nearest_on_axis(axis: &[f64], value: f64, tolerance: f64) -> (usize, bool) {
    let n = axis.len();
    let (lo, hi) = if axis[0] <= axis[n - 1] {
        (axis[0], axis[n - 1])
    } else {
        (axis[n - 1], axis[0])
    };
    let outside = value < lo - tolerance || value > hi + tolerance;

    if n == 1 {
        return (0, outside);
    }

    let ascending = axis[n - 1] > axis[0];
    let pos = if ascending {
        axis.partition_point(|&a| a < value)
    } else {
        axis.partition_point(|&a| a > value)
    };

    let index = if pos == 0 {
        0
    } else if pos >= n {
        n - 1
    } else {
        let below = pos - 1;
        if (value - axis[below]).abs() <= (axis[pos] - value).abs() {
            below
        } else {
            pos
        }
    };
    (index, outside)
}
