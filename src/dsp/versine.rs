//! Versine (mid-chord offset) engine.
//!
//! Measured versines reproduce what a chord-based measurement car sees;
//! theoretical versines are what a perfectly built curve would measure.
//! The difference between the two is the irregularity the planning
//! stages work on.

use serde::{Deserialize, Serialize};

use crate::data::curve::CurveTable;
use crate::dsp::stats::{self, SeriesStats};
use crate::error::CoreError;

/// Safety clamp for estimated measurement-car correction rates.
pub const CORRECTION_RATE_MIN: f64 = 0.8;
pub const CORRECTION_RATE_MAX: f64 = 1.3;

/// Mid-chord offsets of `values` for a chord of `chord_m` metres.
///
/// `V[i] = (y[i-h] + y[i+h]) / 2 - y[i]` with half-chord index
/// `h = round((L/2) / delta_d)`. Samples whose chord ends fall outside
/// the series are 0.
pub fn measured_versine(
    values: &[f64],
    chord_m: f64,
    delta_d: f64,
) -> Result<Vec<f64>, CoreError> {
    if values.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    if !(chord_m > 0.0) || !(delta_d > 0.0) {
        return Err(CoreError::InvalidCurve {
            position: 0.0,
            reason: format!(
                "chord {} m and sampling interval {} m must be positive",
                chord_m, delta_d
            ),
        });
    }

    let n = values.len();
    let h = (((chord_m / 2.0) / delta_d).round() as usize).max(1);
    let mut out = vec![0.0; n];
    for i in h..n.saturating_sub(h) {
        out[i] = (values[i - h] + values[i + h]) / 2.0 - values[i];
    }
    Ok(out)
}

/// Theoretical versine (mm) of a perfectly built curve at each position,
/// for a chord of `chord_m` metres.
///
/// Circular sections give `1000 * L^2 / (8R)`; transitions scale that by
/// the local curvature weighting (clothoid and linear ramp with arc
/// length, cubic with the smoothstep weighting).
pub fn theoretical_versine(table: &CurveTable, positions: &[f64], chord_m: f64) -> Vec<f64> {
    positions
        .iter()
        .map(|&pos| match table.local_radius_at(pos) {
            Some(radius) => 1000.0 * chord_m * chord_m / (8.0 * radius),
            None => 0.0,
        })
        .collect()
}

/// Outcome of a correction-rate application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub values: Vec<f64>,
    /// The rate actually applied, after the safety clamp.
    pub applied_rate: f64,
    /// The rate before clamping.
    pub requested_rate: f64,
    pub clamped: bool,
}

/// Estimate the multiplicative correction rate that maps a measured
/// versine series onto a reference series, by RMS ratio. Returns 1.0
/// when the measured series carries no signal.
pub fn estimate_correction_rate(measured: &[f64], reference: &[f64]) -> f64 {
    let measured_rms = stats::stats(measured).rms;
    if measured_rms == 0.0 {
        return 1.0;
    }
    stats::stats(reference).rms / measured_rms
}

/// Apply a multiplicative correction rate, clamped into
/// `[CORRECTION_RATE_MIN, CORRECTION_RATE_MAX]`.
pub fn apply_correction_rate(values: &[f64], rate: f64) -> CorrectionOutcome {
    let applied = rate.clamp(CORRECTION_RATE_MIN, CORRECTION_RATE_MAX);
    let clamped = applied != rate;
    if clamped {
        log::warn!(
            "correction rate {:.3} outside [{}, {}], clamped to {:.3}",
            rate,
            CORRECTION_RATE_MIN,
            CORRECTION_RATE_MAX,
            applied
        );
    }
    CorrectionOutcome {
        values: values.iter().map(|v| v * applied).collect(),
        applied_rate: applied,
        requested_rate: rate,
        clamped,
    }
}

/// Statistics of a versine series, excluding the boundary zeros.
pub fn versine_stats(values: &[f64]) -> SeriesStats {
    stats::stats_excluding_zeros(values)
}
