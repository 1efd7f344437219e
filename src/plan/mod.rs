//! Plan-line synthesis: the target geometry the track is moved to.

pub mod convex;
pub mod crossing;
pub mod spline;
pub mod zero_point;

use serde::{Deserialize, Serialize};

pub use convex::{optimize_convex, ConvexOutcome, ConvexStats};
pub use crossing::{crossing_knots, detect_zero_crossings, CrossingKind, ZeroCrossing};
pub use spline::{interp_linear, CubicSpline};
pub use zero_point::{synthesize_zero_point, ZeroPointOutcome};

/// Interpolation scheme for the zero-point plan line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Spline,
    Linear,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Spline
    }
}

/// A synthesized plan line, sample-aligned with the restored waveform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLine {
    pub values: Vec<f64>,
    /// Samples pinned by fixed points.
    pub fixed: Vec<bool>,
    /// Samples clamped by a movement-limit window.
    pub limited: Vec<bool>,
    /// Heuristic plan quality, 0-100.
    pub quality_score: f64,
    /// False when constraint enforcement hit the pass cap.
    pub converged: bool,
    /// Constraint-enforcement passes performed.
    pub passes: usize,
}

impl PlanLine {
    pub(crate) fn unconstrained(values: Vec<f64>) -> Self {
        let n = values.len();
        Self {
            values,
            fixed: vec![false; n],
            limited: vec![false; n],
            quality_score: 0.0,
            converged: true,
            passes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Plan quality score used by both synthesis strategies.
///
/// Starts at 100, penalises large average and peak movements, rewards a
/// high upward ratio, clamps into [0, 100].
pub(crate) fn plan_quality_score(movements: &[f64]) -> f64 {
    use crate::dsp::stats::{max_abs, mean_abs};

    let avg = mean_abs(movements);
    let peak = max_abs(movements);
    let mut score = 100.0;
    if avg > 10.0 {
        score -= 2.0 * (avg - 10.0);
    }
    if avg > 20.0 {
        score -= 3.0 * (avg - 20.0);
    }
    if peak > 30.0 {
        score -= peak - 30.0;
    }
    if peak > 50.0 {
        score -= 2.0 * (peak - 50.0);
    }
    if !movements.is_empty() {
        let up_ratio =
            movements.iter().filter(|&&m| m >= 0.0).count() as f64 / movements.len() as f64;
        if up_ratio >= 0.7 {
            score += 10.0;
        }
        if up_ratio >= 0.8 {
            score += 10.0;
        }
    }
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_upward_movements_score_high() {
        let movements = vec![2.0; 100];
        let score = plan_quality_score(&movements);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn large_movements_are_penalised() {
        let movements = vec![40.0; 100];
        // avg 40: -2*30 - 3*20 = -120; peak 40: -10; up bonus +20.
        let score = plan_quality_score(&movements);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn downward_heavy_plans_lose_the_bonus() {
        let up = vec![5.0; 80].into_iter().chain(vec![-5.0; 20]).collect::<Vec<_>>();
        let down = vec![5.0; 20].into_iter().chain(vec![-5.0; 80]).collect::<Vec<_>>();
        assert!(plan_quality_score(&up) > plan_quality_score(&down));
    }
}
