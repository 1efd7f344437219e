//! Zero-point plan-line synthesis.
//!
//! The plan is interpolated through the natural zeros of the restored
//! waveform, then pushed inside the movement envelope by an iterative
//! enforcement loop with upward bias, and finally smoothed.

use serde::{Deserialize, Serialize};

use crate::data::constraints::Constraints;
use crate::data::series::Series;
use crate::error::CoreError;
use crate::plan::crossing::{crossing_knots, detect_zero_crossings, ZeroCrossing};
use crate::plan::spline::{interp_linear, CubicSpline};
use crate::plan::{plan_quality_score, Interpolation, PlanLine};

/// Maximum constraint-enforcement passes before giving up.
const MAX_PASSES: usize = 10;
/// Fraction of the allowable limit the enforcement aims for.
const LIMIT_TARGET: f64 = 0.95;
/// Half-width, in samples, of the upward redistribution kernel.
const REDISTRIBUTION_REACH: usize = 20;
/// Decay constant of the redistribution kernel, in samples.
const REDISTRIBUTION_DECAY: f64 = 5.0;

/// Result of zero-point synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroPointOutcome {
    pub plan: PlanLine,
    pub crossings: Vec<ZeroCrossing>,
    /// True when the moving-average fallback was used (< 2 crossings).
    pub fallback: bool,
    pub warnings: Vec<String>,
}

/// Interpolate a plan through the crossing knots at every sample
/// position. The knots all carry value zero by construction.
pub fn interpolate_through_crossings(
    series: &Series,
    knots: &[f64],
    interpolation: Interpolation,
) -> Result<Vec<f64>, CoreError> {
    let zeros = vec![0.0; knots.len()];
    match interpolation {
        Interpolation::Spline => {
            let spline = CubicSpline::natural(knots, &zeros)?;
            Ok((0..series.len())
                .map(|i| spline.evaluate(series.position(i)))
                .collect())
        }
        Interpolation::Linear => Ok((0..series.len())
            .map(|i| interp_linear(knots, &zeros, series.position(i)))
            .collect()),
    }
}

/// Centred moving average used when the waveform never crosses zero.
fn moving_average_plan(values: &[f64], smoothing_window: usize) -> Vec<f64> {
    let n = values.len();
    let window = (10 * smoothing_window.max(1)).min(n / 4).max(1);
    let mut out = vec![0.0; n];
    for (i, slot) in out.iter_mut().enumerate() {
        let lo = i.saturating_sub(window);
        let hi = (i + window).min(n - 1);
        let span = &values[lo..=hi];
        *slot = span.iter().sum::<f64>() / span.len() as f64;
    }
    out
}

/// Synthesize a zero-point plan line for `restored`.
pub fn synthesize_zero_point(
    restored: &Series,
    constraints: &Constraints,
    interpolation: Interpolation,
    smoothing_window: usize,
) -> Result<ZeroPointOutcome, CoreError> {
    if restored.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    let n = restored.len();
    let values = restored.values();
    let mut warnings = Vec::new();

    // 1. Crossings and initial interpolation.
    let crossings = detect_zero_crossings(restored);
    let knots = crossing_knots(&crossings, restored.interval() * 1e-6);
    let (mut plan, fallback) = if knots.len() >= 2 {
        (
            interpolate_through_crossings(restored, &knots, interpolation)?,
            false,
        )
    } else {
        log::info!(
            "zero-point synthesis: {} crossings, falling back to moving average",
            knots.len()
        );
        (moving_average_plan(values, smoothing_window), true)
    };

    // 2. Fixed points pin the plan before enforcement.
    let mut fixed = vec![false; n];
    let half_step = restored.interval() / 2.0;
    for fp in &constraints.fixed_points {
        let i = restored.index_of(fp.position);
        if (restored.position(i) - fp.position).abs() <= half_step + 1e-9 {
            plan[i] = fp.target_level.unwrap_or(values[i]);
            fixed[i] = true;
        }
    }

    // 3. Iterative constraint enforcement with upward bias.
    let mut limited = vec![false; n];
    let mut converged = false;
    let mut passes = 0;
    for _ in 0..MAX_PASSES {
        passes += 1;
        let mut adjusted = false;
        for i in 0..n {
            if fixed[i] {
                continue;
            }
            let m = plan[i] - values[i];
            let upward = m >= 0.0;
            let limit = constraints.allowable_movement(restored.position(i), upward);
            if m.abs() <= limit {
                continue;
            }
            adjusted = true;
            limited[i] = true;
            if upward && constraints.upward_priority {
                // Lowering the plan here would trade lift for drop;
                // instead the excess is bled upward into the
                // neighbourhood and the next pass re-evaluates.
                let excess = m - LIMIT_TARGET * limit;
                let lo = i.saturating_sub(REDISTRIBUTION_REACH);
                let hi = (i + REDISTRIBUTION_REACH).min(n - 1);
                for j in lo..=hi {
                    if j == i || fixed[j] {
                        continue;
                    }
                    let distance = (j as isize - i as isize).unsigned_abs() as f64;
                    plan[j] += excess * (-distance / REDISTRIBUTION_DECAY).exp();
                }
            } else {
                plan[i] = values[i] + LIMIT_TARGET * limit * m.signum();
            }
        }
        if !adjusted {
            converged = true;
            break;
        }
    }
    if !converged {
        let msg = format!(
            "constraint enforcement did not converge within {} passes; returning last iterate",
            MAX_PASSES
        );
        log::warn!("{}", msg);
        warnings.push(msg);
    }

    // 4. Final 3-point smoothing, fixed points exempt.
    let snapshot = plan.clone();
    for i in 1..n.saturating_sub(1) {
        if fixed[i] {
            continue;
        }
        plan[i] = (snapshot[i - 1] + snapshot[i] + snapshot[i + 1]) / 3.0;
    }

    let movements: Vec<f64> = plan.iter().zip(values.iter()).map(|(p, v)| p - v).collect();
    let quality_score = plan_quality_score(&movements);

    Ok(ZeroPointOutcome {
        plan: PlanLine {
            values: plan,
            fixed,
            limited,
            quality_score,
            converged,
            passes,
        },
        crossings,
        fallback,
        warnings,
    })
}

/// Good-up ratio of a movement vector: fraction of non-negative moves.
pub fn good_up_ratio(movements: &[f64]) -> f64 {
    if movements.is_empty() {
        return 0.0;
    }
    movements.iter().filter(|&&m| m >= 0.0).count() as f64 / movements.len() as f64
}
