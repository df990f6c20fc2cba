//! Bucketed spatial index and convex hull for irregular grids.

use std::time::Instant;

use tracing::trace;

/// Target average number of points per bucket.
const POINTS_PER_BUCKET: f64 = 4.0;

/// Uniform lat/lon bucket hash over an irregular point set.
///
/// Distances are planar in degrees. Among equidistant points the one with
/// the lowest storage index wins, so lookups are reproducible.
#[derive(Debug)]
pub struct SpatialIndex {
    points: Vec<(f64, f64)>,
    min_lat: f64,
    min_lon: f64,
    cell_lat: f64,
    cell_lon: f64,
    rows: usize,
    cols: usize,
    buckets: Vec<Vec<usize>>,
    /// Counter-clockwise hull in (lon, lat) order.
    hull: Vec<(f64, f64)>,
}

impl SpatialIndex {
    /// Build the index. `points` must be non-empty.
    pub fn build(points: &[(f64, f64)]) -> Self {
        let start = Instant::now();

        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(lat, lon) in points {
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
        }

        let side = ((points.len() as f64 / POINTS_PER_BUCKET).sqrt().ceil() as usize).max(1);
        let span_lat = max_lat - min_lat;
        let span_lon = max_lon - min_lon;
        let rows = if span_lat > 0.0 { side } else { 1 };
        let cols = if span_lon > 0.0 { side } else { 1 };
        let cell_lat = if span_lat > 0.0 { span_lat / rows as f64 } else { 1.0 };
        let cell_lon = if span_lon > 0.0 { span_lon / cols as f64 } else { 1.0 };

        let mut index = Self {
            points: points.to_vec(),
            min_lat,
            min_lon,
            cell_lat,
            cell_lon,
            rows,
            cols,
            buckets: vec![Vec::new(); rows * cols],
            hull: convex_hull(points),
        };

        for (i, &(lat, lon)) in points.iter().enumerate() {
            let (r, c) = index.cell_of(lat, lon);
            index.buckets[r * cols + c].push(i);
        }

        trace!(elapsed_us = start.elapsed().as_micros() as u64, "spatial index build");
        index
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn hull_len(&self) -> usize {
        self.hull.len()
    }

    /// Bucket containing `(lat, lon)`, clamped to the index extent.
    fn cell_of(&self, lat: f64, lon: f64) -> (usize, usize) {
        let r = ((lat - self.min_lat) / self.cell_lat).floor();
        let c = ((lon - self.min_lon) / self.cell_lon).floor();
        let r = (r.max(0.0) as usize).min(self.rows - 1);
        let c = (c.max(0.0) as usize).min(self.cols - 1);
        (r, c)
    }

    /// Index of the nearest point, searching rings of buckets outward.
    pub fn nearest(&self, lat: f64, lon: f64) -> usize {
        let (ci, cj) = self.cell_of(lat, lon);
        let reach_unit = self.cell_lat.min(self.cell_lon);
        let max_ring = self.rows.max(self.cols);
        let mut best: Option<(f64, usize)> = None;

        for ring in 0..=max_ring {
            let r_lo = ci.saturating_sub(ring);
            let r_hi = (ci + ring).min(self.rows - 1);
            let c_lo = cj.saturating_sub(ring);
            let c_hi = (cj + ring).min(self.cols - 1);

            for r in r_lo..=r_hi {
                for c in c_lo..=c_hi {
                    let on_ring = r.abs_diff(ci) == ring || c.abs_diff(cj) == ring;
                    if !on_ring {
                        continue;
                    }
                    for &p in &self.buckets[r * self.cols + c] {
                        let (plat, plon) = self.points[p];
                        let d = (plat - lat).powi(2) + (plon - lon).powi(2);
                        let better = match best {
                            None => true,
                            Some((bd, bi)) => d < bd || (d == bd && p < bi),
                        };
                        if better {
                            best = Some((d, p));
                        }
                    }
                }
            }

            // Anything beyond this ring is at least `ring * reach_unit` away.
            if let Some((d, _)) = best {
                let reach = ring as f64 * reach_unit;
                if d < reach * reach {
                    break;
                }
            }
        }

        best.map(|(_, i)| i).unwrap_or(0)
    }

    /// Whether `(lat, lon)` lies inside the convex hull, within `tolerance` degrees.
    pub fn contains(&self, lat: f64, lon: f64, tolerance: f64) -> bool {
        let p = (lon, lat);
        match self.hull.len() {
            0 => false,
            1 => distance(p, self.hull[0]) <= tolerance,
            2 => segment_distance(p, self.hull[0], self.hull[1]) <= tolerance,
            n => (0..n).all(|i| {
                let a = self.hull[i];
                let b = self.hull[(i + 1) % n];
                let len = distance(a, b);
                // Signed distance to the left of edge a->b.
                cross(a, b, p) / len >= -tolerance
            }),
        }
    }
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let len2 = (b.0 - a.0).powi(2) + (b.1 - a.1).powi(2);
    if len2 == 0.0 {
        return distance(p, a);
    }
    let t = (((p.0 - a.0) * (b.0 - a.0) + (p.1 - a.1) * (b.1 - a.1)) / len2).clamp(0.0, 1.0);
    distance(p, (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1)))
}

/// Andrew's monotone chain over (lon, lat). Collinear points are dropped, so
/// a degenerate set yields one or two vertices.
fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = points.iter().map(|&(lat, lon)| (lon, lat)).collect();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_nearest(points: &[(f64, f64)], lat: f64, lon: f64) -> usize {
        let mut best = (f64::INFINITY, 0);
        for (i, &(plat, plon)) in points.iter().enumerate() {
            let d = (plat - lat).powi(2) + (plon - lon).powi(2);
            if d < best.0 {
                best = (d, i);
            }
        }
        best.1
    }

    fn scattered_points(n: usize) -> Vec<(f64, f64)> {
        // Deterministic pseudo-random scatter over [50, 70] x [0, 30].
        let mut state: u64 = 42;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let a = (state >> 11) as f64 / (1u64 << 53) as f64;
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let b = (state >> 11) as f64 / (1u64 << 53) as f64;
                (50.0 + 20.0 * a, 30.0 * b)
            })
            .collect()
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = scattered_points(500);
        let index = SpatialIndex::build(&points);
        assert!(index.bucket_count() > 1);

        for (k, &(lat, lon)) in scattered_points(700).iter().skip(500).enumerate() {
            let q = (lat + 0.01 * k as f64 % 1.0, lon - 0.5);
            assert_eq!(
                index.nearest(q.0, q.1),
                brute_force_nearest(&points, q.0, q.1),
                "query {:?}",
                q
            );
        }
    }

    #[test]
    fn test_nearest_outside_extent() {
        let points = scattered_points(200);
        let index = SpatialIndex::build(&points);
        for q in [(-10.0, -10.0), (90.0, 15.0), (60.0, 100.0)] {
            assert_eq!(index.nearest(q.0, q.1), brute_force_nearest(&points, q.0, q.1));
        }
    }

    #[test]
    fn test_equidistant_prefers_lowest_index() {
        let points = vec![(0.0, 2.0), (0.0, 0.0), (0.0, 1.0)];
        let index = SpatialIndex::build(&points);
        assert_eq!(index.nearest(0.0, 0.5), 1);
    }

    #[test]
    fn test_hull_contains() {
        let points = vec![(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (2.0, 2.0)];
        let index = SpatialIndex::build(&points);
        assert_eq!(index.hull_len(), 4);
        assert!(index.contains(1.0, 3.0, 1e-9));
        assert!(index.contains(0.0, 2.0, 1e-9));
        assert!(!index.contains(-0.1, 2.0, 1e-9));
        assert!(!index.contains(5.0, 5.0, 1e-9));
    }

    #[test]
    fn test_degenerate_hulls() {
        let single = SpatialIndex::build(&[(1.0, 1.0)]);
        assert!(single.contains(1.0, 1.0, 1e-9));
        assert!(!single.contains(1.0, 1.1, 1e-9));
        assert_eq!(single.nearest(40.0, 40.0), 0);

        let line = SpatialIndex::build(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)]);
        assert_eq!(line.hull_len(), 2);
        assert!(line.contains(0.0, 1.5, 1e-9));
        assert!(!line.contains(0.5, 1.5, 1e-9));
    }
}
