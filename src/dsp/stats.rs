//! Series statistics.
//!
//! Population statistics over real vectors, plus the versine-output
//! convention: exact-zero samples (boundary fill) are excluded from
//! sigma/RMS.

use serde::{Deserialize, Serialize};

/// Basic statistics over a real vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub sigma: f64,
    pub rms: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl SeriesStats {
    pub const EMPTY: SeriesStats = SeriesStats {
        count: 0,
        mean: 0.0,
        sigma: 0.0,
        rms: 0.0,
        min: 0.0,
        max: 0.0,
        peak_to_peak: 0.0,
    };
}

/// Statistics over all samples.
pub fn stats(values: &[f64]) -> SeriesStats {
    stats_filtered(values.iter().copied())
}

/// Statistics excluding exact zeros (versine boundary convention).
pub fn stats_excluding_zeros(values: &[f64]) -> SeriesStats {
    stats_filtered(values.iter().copied().filter(|&v| v != 0.0))
}

fn stats_filtered(values: impl Iterator<Item = f64>) -> SeriesStats {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        sum_sq += v * v;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return SeriesStats::EMPTY;
    }
    let n = count as f64;
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    SeriesStats {
        count,
        mean,
        sigma: variance.sqrt(),
        rms: (sum_sq / n).sqrt(),
        min,
        max,
        peak_to_peak: max - min,
    }
}

/// Mean of absolute values; 0 for empty input.
pub fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}

/// Maximum of absolute values; 0 for empty input.
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().map(|v| v.abs()).fold(0.0f64, f64::max)
}
