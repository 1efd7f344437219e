//! Convex (upward-preferring) plan optimiser.
//!
//! Alternative to zero-point synthesis with an explicit up/down
//! asymmetry: downward movements are pre-emptively halved, capacity caps
//! are applied per direction, and movement-limit windows clamp the rest.

use serde::{Deserialize, Serialize};

use crate::data::constraints::Constraints;
use crate::data::series::Series;
use crate::error::CoreError;
use crate::plan::crossing::{crossing_knots, detect_zero_crossings};
use crate::plan::spline::interp_linear;
use crate::plan::{plan_quality_score, PlanLine};

/// Per-plan movement statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvexStats {
    pub upward_count: usize,
    pub downward_count: usize,
    pub upward_total: f64,
    pub downward_total: f64,
    pub mean_abs: f64,
    pub max_abs: f64,
    /// Fraction of samples moved upward (or untouched).
    pub good_up_ratio: f64,
}

/// Result of the convex optimiser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvexOutcome {
    pub plan: PlanLine,
    /// Per-sample movement `plan - restored`, mm.
    pub movements: Vec<f64>,
    pub stats: ConvexStats,
}

/// Generate an upward-preferring plan for `restored`.
pub fn optimize_convex(
    restored: &Series,
    constraints: &Constraints,
) -> Result<ConvexOutcome, CoreError> {
    if restored.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    let n = restored.len();
    let values = restored.values();
    let max_up = constraints.max_upward;
    let max_down = constraints.max_downward;

    // 1. Initial plan: linear interpolation across the zero crossings,
    //    which is the level-0 line when fewer than two exist.
    let crossings = detect_zero_crossings(restored);
    let knots = crossing_knots(&crossings, restored.interval() * 1e-6);
    let mut plan: Vec<f64> = if knots.len() >= 2 {
        let zeros = vec![0.0; knots.len()];
        (0..n)
            .map(|i| interp_linear(&knots, &zeros, restored.position(i)))
            .collect()
    } else {
        vec![0.0; n]
    };

    // 2. Fixed points overwrite the plan.
    let mut fixed = vec![false; n];
    let half_step = restored.interval() / 2.0;
    for fp in &constraints.fixed_points {
        let i = restored.index_of(fp.position);
        if (restored.position(i) - fp.position).abs() <= half_step + 1e-9 {
            plan[i] = fp.target_level.unwrap_or(values[i]);
            fixed[i] = true;
        }
    }

    // 3. Upward-priority pass: cap both directions, then halve the
    //    remaining downward excursions.
    for i in 0..n {
        if fixed[i] {
            continue;
        }
        let current = values[i];
        let mut delta = plan[i] - current;
        if delta < -max_down {
            plan[i] = current - max_down;
            delta = -max_down;
        }
        if delta > max_up {
            plan[i] = current + max_up;
            delta = max_up;
        }
        if constraints.upward_priority && delta < -max_down / 2.0 {
            plan[i] = current - max_down / 2.0;
        }
    }

    // 4. Movement-limit windows.
    let mut limited = vec![false; n];
    for window in &constraints.movement_limits {
        for i in 0..n {
            if fixed[i] || !window.contains(restored.position(i)) {
                continue;
            }
            let delta = plan[i] - values[i];
            if delta.abs() > window.max_abs_movement {
                plan[i] = values[i] + window.max_abs_movement * delta.signum();
                limited[i] = true;
            }
        }
    }

    // 5. 5-point centred smoothing over non-fixed samples.
    let snapshot = plan.clone();
    for i in 0..n {
        if fixed[i] {
            continue;
        }
        let lo = i.saturating_sub(2);
        let hi = (i + 2).min(n - 1);
        let span = &snapshot[lo..=hi];
        plan[i] = span.iter().sum::<f64>() / span.len() as f64;
    }

    // Smoothing must not push a sample back outside its envelope.
    for i in 0..n {
        if fixed[i] {
            continue;
        }
        let delta = plan[i] - values[i];
        if delta < -max_down {
            plan[i] = values[i] - max_down;
        } else if delta > max_up {
            plan[i] = values[i] + max_up;
        }
    }

    let movements: Vec<f64> = plan.iter().zip(values.iter()).map(|(p, v)| p - v).collect();
    let stats = movement_stats(&movements);
    let quality_score = plan_quality_score(&movements);

    Ok(ConvexOutcome {
        plan: PlanLine {
            values: plan,
            fixed,
            limited,
            quality_score,
            converged: true,
            passes: 1,
        },
        movements,
        stats,
    })
}

fn movement_stats(movements: &[f64]) -> ConvexStats {
    let upward: Vec<f64> = movements.iter().copied().filter(|&m| m >= 0.0).collect();
    let downward: Vec<f64> = movements.iter().copied().filter(|&m| m < 0.0).collect();
    let mean_abs = crate::dsp::stats::mean_abs(movements);
    let max_abs = crate::dsp::stats::max_abs(movements);
    ConvexStats {
        upward_count: upward.len(),
        downward_count: downward.len(),
        upward_total: upward.iter().sum(),
        downward_total: downward.iter().sum(),
        mean_abs,
        max_abs,
        good_up_ratio: if movements.is_empty() {
            0.0
        } else {
            upward.len() as f64 / movements.len() as f64
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::constraints::{FixedPoint, MovementLimit};

    fn triangle(n: usize, amplitude: f64, period_samples: usize) -> Series {
        let values: Vec<f64> = (0..n)
            .map(|i| {
                let phase = (i % period_samples) as f64 / period_samples as f64;
                let tri = if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                };
                amplitude * tri
            })
            .collect();
        Series::from_values(0.0, 0.25, values).unwrap()
    }

    #[test]
    fn downward_movement_is_bounded() {
        // Triangle wave, amplitude 30 mm, period 40 m (160 samples).
        let restored = triangle(800, 30.0, 160);
        let constraints = Constraints {
            max_upward: 50.0,
            max_downward: 10.0,
            upward_priority: true,
            ..Constraints::default()
        };
        let outcome = optimize_convex(&restored, &constraints).unwrap();
        for (i, &m) in outcome.movements.iter().enumerate() {
            assert!(
                m >= -10.0 - 1e-9,
                "movement[{}] = {} breaches the drop cap",
                i,
                m
            );
        }
        // Peaks above +20 mm were clamped within a 10 mm drop.
        for (i, &r) in restored.values().iter().enumerate() {
            if r >= 20.0 {
                assert!(
                    outcome.plan.values[i] >= r - 10.0 - 1e-9,
                    "plan[{}] = {} dropped more than 10 mm below {}",
                    i,
                    outcome.plan.values[i],
                    r
                );
            }
        }
    }

    #[test]
    fn upward_priority_halves_the_drop() {
        let restored = triangle(800, 30.0, 160);
        let constraints = Constraints {
            max_upward: 50.0,
            max_downward: 10.0,
            upward_priority: true,
            ..Constraints::default()
        };
        let outcome = optimize_convex(&restored, &constraints).unwrap();
        // Before smoothing every drop is capped at max_down / 2; after
        // 5-point smoothing the bound only moves by the local slope.
        let worst = outcome
            .movements
            .iter()
            .copied()
            .fold(0.0f64, |acc, m| acc.min(m));
        assert!(
            worst >= -7.0,
            "worst drop {} should stay near -max_down/2",
            worst
        );
    }

    #[test]
    fn fixed_points_survive_every_pass() {
        let restored = triangle(400, 20.0, 160);
        let constraints = Constraints {
            fixed_points: vec![FixedPoint {
                position: 30.0,
                target_level: Some(12.0),
                must_keep: true,
            }],
            ..Constraints::default()
        };
        let outcome = optimize_convex(&restored, &constraints).unwrap();
        let i = restored.index_of(30.0);
        assert!(outcome.plan.fixed[i]);
        assert_eq!(outcome.plan.values[i], 12.0);
    }

    #[test]
    fn movement_windows_clamp_and_mark() {
        let restored = triangle(400, 30.0, 160);
        let constraints = Constraints {
            max_upward: 100.0,
            max_downward: 100.0,
            upward_priority: false,
            movement_limits: vec![MovementLimit {
                start_pos: 0.0,
                end_pos: 100.0,
                max_abs_movement: 4.0,
            }],
            ..Constraints::default()
        };
        let outcome = optimize_convex(&restored, &constraints).unwrap();
        assert!(
            outcome.plan.limited.iter().any(|&l| l),
            "the 4 mm window must clamp somewhere on a 30 mm triangle"
        );
    }

    #[test]
    fn stats_count_directions() {
        let restored = triangle(800, 10.0, 160);
        let constraints = Constraints {
            max_upward: 100.0,
            max_downward: 100.0,
            upward_priority: false,
            ..Constraints::default()
        };
        let outcome = optimize_convex(&restored, &constraints).unwrap();
        let s = &outcome.stats;
        assert_eq!(s.upward_count + s.downward_count, 800);
        assert!(s.good_up_ratio > 0.0 && s.good_up_ratio < 1.0);
        assert!(s.downward_total <= 0.0);
        assert!(s.max_abs <= 10.0 + 1e-9);
    }
}
