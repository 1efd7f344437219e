//! Zero-crossing detection over the restored waveform.

use serde::{Deserialize, Serialize};

use crate::data::series::Series;

/// How a crossing was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossingKind {
    /// Sign change from negative to positive.
    Ascending,
    /// Sign change from positive to negative.
    Descending,
    /// A sample that is exactly zero.
    Exact,
    /// First sample of the series is exactly zero.
    BoundaryStart,
    /// Last sample of the series is exactly zero.
    BoundaryEnd,
}

/// A zero crossing of the restored waveform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroCrossing {
    pub position: f64,
    pub kind: CrossingKind,
    /// Index of the sample at (or immediately before) the crossing.
    pub source_index: usize,
}

/// Detect every zero crossing of `series`.
///
/// Sign changes between adjacent samples yield a linearly interpolated
/// crossing position; exactly-zero samples yield an additional `Exact`
/// crossing, with boundary markers when they open or close the series.
pub fn detect_zero_crossings(series: &Series) -> Vec<ZeroCrossing> {
    let values = series.values();
    let n = values.len();
    let mut crossings = Vec::new();

    for (i, &v) in values.iter().enumerate() {
        if v == 0.0 {
            crossings.push(ZeroCrossing {
                position: series.position(i),
                kind: CrossingKind::Exact,
                source_index: i,
            });
            if i == 0 {
                crossings.push(ZeroCrossing {
                    position: series.position(i),
                    kind: CrossingKind::BoundaryStart,
                    source_index: i,
                });
            }
            if i == n - 1 && n > 1 {
                crossings.push(ZeroCrossing {
                    position: series.position(i),
                    kind: CrossingKind::BoundaryEnd,
                    source_index: i,
                });
            }
        }
    }

    for i in 1..n {
        let prev = values[i - 1];
        let cur = values[i];
        if prev * cur < 0.0 {
            let p0 = series.position(i - 1);
            let p1 = series.position(i);
            let frac = prev.abs() / (prev.abs() + cur.abs());
            crossings.push(ZeroCrossing {
                position: p0 + (p1 - p0) * frac,
                kind: if prev < cur {
                    CrossingKind::Ascending
                } else {
                    CrossingKind::Descending
                },
                source_index: i - 1,
            });
        }
    }

    crossings.sort_by(|a, b| a.position.total_cmp(&b.position));
    crossings
}

/// Distinct crossing positions, suitable as interpolation knots.
///
/// Boundary markers duplicate their `Exact` crossing; positions closer
/// than `min_gap` metres collapse into one knot.
pub fn crossing_knots(crossings: &[ZeroCrossing], min_gap: f64) -> Vec<f64> {
    let mut knots: Vec<f64> = Vec::with_capacity(crossings.len());
    for c in crossings {
        match knots.last() {
            Some(&last) if (c.position - last).abs() < min_gap => {}
            _ => knots.push(c.position),
        }
    }
    knots
}
